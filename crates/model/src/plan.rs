//! Per-layer configuration derived from a validated network description.

use std::collections::BTreeMap;

use attention::AttentionType;
use layers::ActivationKind;

use crate::config::ResolvedModelConfig;

/// Everything a single EMHS layer is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    pub index: usize,
    pub group: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub hidden_channels: usize,
    pub num_elements: usize,
    pub attention_enabled: bool,
    pub latent_class_count: Option<usize>,
    pub kernel_size: [usize; 3],
    pub voxelization: [usize; 3],
    pub attention_type: AttentionType,
    pub activation: ActivationKind,
    pub is_first: bool,
    pub is_last: bool,
}

impl LayerSpec {
    /// Key the layer is registered and parameterised under.
    pub fn key(&self) -> String {
        self.index.to_string()
    }
}

/// Derives one [`LayerSpec`] per layer index, ordered by ascending index.
///
/// Groups are visited in declaration order and indices within a group in
/// ascending order; when groups overlap the later group's spec replaces the
/// earlier one. First/last flags refer to the whole index set, not the group.
pub fn layer_specs(config: &ResolvedModelConfig) -> Vec<LayerSpec> {
    let partition = &config.partition;
    let (first, last) = (partition.first(), partition.last());

    let mut specs = BTreeMap::new();
    for (group, range) in partition.groups() {
        let latent_class_count = config
            .latent_classes
            .as_ref()
            .filter(|_| config.use_attention)
            .and_then(|latent| latent.get(group).copied());

        for index in range {
            let is_first = index == first;
            let is_last = index == last;
            let spec = LayerSpec {
                index,
                group,
                in_channels: if is_first {
                    config.input_nc
                } else {
                    config.feat_dim
                },
                out_channels: if is_last {
                    config.output_nc
                } else {
                    config.feat_dim
                },
                hidden_channels: config.feat_dim,
                num_elements: config.num_elm,
                attention_enabled: config.use_attention && !is_last,
                latent_class_count,
                kernel_size: config.kernel_size,
                voxelization: config.voxelization,
                attention_type: config.attention_type,
                activation: config.activation,
                is_first,
                is_last,
            };
            specs.insert(index, spec);
        }
    }
    specs.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::EmhsModelConfig, error::ConfigurationError};

    fn resolve(config: EmhsModelConfig) -> Result<ResolvedModelConfig, ConfigurationError> {
        config.validate()
    }

    #[test]
    fn two_groups_get_their_latent_counts() -> Result<(), ConfigurationError> {
        let mut config = EmhsModelConfig::new(3, 7, vec![0, 2, 5]).with_latent_classes(vec![3, 4]);
        config.num_layers = 5;
        config.feat_dim = 16;

        let specs = layer_specs(&resolve(config)?);

        assert_eq!(specs.len(), 5);
        let groups: Vec<_> = specs.iter().map(|s| (s.index, s.group)).collect();
        assert_eq!(groups, vec![(0, 0), (1, 0), (2, 1), (3, 1), (4, 1)]);
        let latent: Vec<_> = specs.iter().map(|s| s.latent_class_count).collect();
        assert_eq!(latent, vec![Some(3), Some(3), Some(4), Some(4), Some(4)]);

        assert!(specs[0].is_first);
        assert_eq!(specs[0].in_channels, 3);
        assert_eq!(specs[0].out_channels, 16);
        assert!(specs[4].is_last);
        assert_eq!(specs[4].in_channels, 16);
        assert_eq!(specs[4].out_channels, 7);
        assert!(!specs[4].attention_enabled);
        assert!(specs[..4].iter().all(|s| s.attention_enabled));
        Ok(())
    }

    #[test]
    fn single_layer_is_both_first_and_last() -> Result<(), ConfigurationError> {
        let mut config = EmhsModelConfig::new(3, 7, vec![0, 1]).with_latent_classes(vec![2]);
        config.num_layers = 1;

        let specs = layer_specs(&resolve(config)?);

        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert!(spec.is_first && spec.is_last);
        assert_eq!((spec.in_channels, spec.out_channels), (3, 7));
        assert!(!spec.attention_enabled);
        assert_eq!(spec.latent_class_count, Some(2));
        Ok(())
    }

    #[test]
    fn disabled_attention_drops_latent_counts() -> Result<(), ConfigurationError> {
        let mut config = EmhsModelConfig::new(3, 7, vec![0, 2, 4]);
        config.num_layers = 4;
        config.use_attention = false;

        let specs = layer_specs(&resolve(config)?);

        assert!(specs
            .iter()
            .all(|s| !s.attention_enabled && s.latent_class_count.is_none()));
        Ok(())
    }

    #[test]
    fn overlapping_groups_keep_the_later_assignment() -> Result<(), ConfigurationError> {
        let mut config =
            EmhsModelConfig::new(3, 7, vec![0, 3, 2, 5]).with_latent_classes(vec![2, 9, 6]);
        config.num_layers = 5;

        let specs = layer_specs(&resolve(config)?);

        assert_eq!(specs.len(), 5);
        assert_eq!(specs[2].group, 2);
        assert_eq!(specs[2].latent_class_count, Some(6));
        assert_eq!(specs.iter().map(LayerSpec::key).collect::<Vec<_>>(), ["0", "1", "2", "3", "4"]);
        Ok(())
    }
}
