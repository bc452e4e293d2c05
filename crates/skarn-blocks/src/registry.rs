use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::config::BlocksConfig;
use crate::types::{AIR, BlockId, BlockType, FlowStrength, Opacity};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("duplicate block name {0:?}")]
    DuplicateName(String),
}

/// Read-only catalog of block types, indexed by `BlockId`. Id 0 is always
/// air. The registry is passed explicitly into every meshing call; there
/// is no process-wide instance.
#[derive(Debug)]
pub struct BlockRegistry {
    types: Vec<BlockType>,
    by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Builds a registry from an ordered list of non-air types. Ids are
    /// assigned as `1 + index`.
    pub fn from_types(types: Vec<BlockType>) -> Result<Self, RegistryError> {
        let mut all = Vec::with_capacity(types.len() + 1);
        all.push(BlockType::transparent("air"));
        all.extend(types);
        let mut by_name = HashMap::with_capacity(all.len());
        for (id, ty) in all.iter().enumerate() {
            if by_name.insert(ty.name.clone(), id as BlockId).is_some() {
                return Err(RegistryError::DuplicateName(ty.name.clone()));
            }
        }
        Ok(Self {
            types: all,
            by_name,
        })
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let cfg: BlocksConfig = toml::from_str(&text).map_err(|source| RegistryError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_types(cfg.into_types())
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.types.get(id as usize)
    }

    #[inline]
    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Fully opaque unit cube. Unknown ids read as air.
    #[inline]
    pub fn is_opaque_cube(&self, id: BlockId) -> bool {
        self.get(id)
            .map(|ty| ty.opacity == Opacity::Opaque && ty.model.is_none())
            .unwrap_or(false)
    }

    /// Transparent solid cube (glass-like): not air, not liquid, no model.
    #[inline]
    pub fn is_transparent_cube(&self, id: BlockId) -> bool {
        id != AIR
            && self
                .get(id)
                .map(|ty| {
                    ty.opacity == Opacity::Transparent && ty.liquid.is_none() && ty.model.is_none()
                })
                .unwrap_or(false)
    }

    #[inline]
    pub fn flow(&self, id: BlockId) -> Option<FlowStrength> {
        self.get(id).and_then(|ty| ty.liquid)
    }

    #[inline]
    pub fn is_liquid(&self, id: BlockId) -> bool {
        self.flow(id).is_some()
    }

    #[inline]
    pub fn model(&self, id: BlockId) -> Option<&crate::types::BlockModel> {
        self.get(id).and_then(|ty| ty.model.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_is_id_zero_and_never_a_cube() {
        let reg = BlockRegistry::from_types(vec![BlockType::solid("stone")]).unwrap();
        assert_eq!(reg.id_by_name("air"), Some(0));
        assert!(!reg.is_opaque_cube(0));
        assert!(!reg.is_transparent_cube(0));
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = BlockRegistry::from_types(vec![
            BlockType::solid("stone"),
            BlockType::transparent("stone"),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
    }

    #[test]
    fn classification_partitions_cubes() {
        let reg = BlockRegistry::from_types(vec![
            BlockType::solid("stone"),
            BlockType::transparent("glass"),
            BlockType::liquid("water_source", FlowStrength::Source),
        ])
        .unwrap();
        let stone = reg.id_by_name("stone").unwrap();
        let glass = reg.id_by_name("glass").unwrap();
        let water = reg.id_by_name("water_source").unwrap();
        assert!(reg.is_opaque_cube(stone) && !reg.is_transparent_cube(stone));
        assert!(reg.is_transparent_cube(glass) && !reg.is_opaque_cube(glass));
        assert!(reg.is_liquid(water) && !reg.is_transparent_cube(water));
    }
}
