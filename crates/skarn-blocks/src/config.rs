//! TOML block definitions. Mirrors the registry's runtime types with
//! serde-friendly shapes; see `assets/blocks.toml` style configs.

use serde::Deserialize;

use crate::types::{BlockModel, BlockType, FlowStrength, ModelBox, Opacity};

#[derive(Debug, Deserialize)]
pub struct BlocksConfig {
    #[serde(default, rename = "block")]
    pub blocks: Vec<BlockCfg>,
}

#[derive(Debug, Deserialize)]
pub struct BlockCfg {
    pub name: String,
    #[serde(default)]
    pub opacity: OpacityCfg,
    /// One of "weak" | "strong" | "source" for liquid blocks.
    #[serde(default)]
    pub liquid: Option<String>,
    #[serde(default, rename = "box")]
    pub boxes: Vec<ModelBoxCfg>,
    #[serde(default)]
    pub orientable: bool,
}

#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OpacityCfg {
    #[default]
    Opaque,
    Transparent,
}

#[derive(Debug, Deserialize)]
pub struct ModelBoxCfg {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BlocksConfig {
    pub fn into_types(self) -> Vec<BlockType> {
        self.blocks.into_iter().map(BlockCfg::into_type).collect()
    }
}

impl BlockCfg {
    fn into_type(self) -> BlockType {
        let liquid = self.liquid.as_deref().and_then(|s| match s {
            "weak" => Some(FlowStrength::Weak),
            "strong" => Some(FlowStrength::Strong),
            "source" => Some(FlowStrength::Source),
            _ => None,
        });
        // A liquid or model block never occludes, whatever the config says.
        let opacity = if liquid.is_some() || !self.boxes.is_empty() {
            Opacity::Transparent
        } else {
            match self.opacity {
                OpacityCfg::Opaque => Opacity::Opaque,
                OpacityCfg::Transparent => Opacity::Transparent,
            }
        };
        let model = if self.boxes.is_empty() {
            None
        } else {
            Some(BlockModel {
                boxes: self
                    .boxes
                    .into_iter()
                    .map(|b| ModelBox {
                        min: b.min,
                        max: b.max,
                    })
                    .collect(),
            })
        };
        BlockType {
            name: self.name,
            opacity,
            liquid,
            model,
            orientable: self.orientable,
        }
    }
}
