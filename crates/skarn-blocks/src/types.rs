/// Runtime block type id; `0` is always air.
pub type BlockId = u16;

pub const AIR: BlockId = 0;

/// How a block interacts with face culling and sky light.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Opacity {
    /// Full cube that hides faces behind it and blocks sky light.
    Opaque,
    /// Light passes through (air, glass, liquids, model blocks).
    Transparent,
}

/// Discrete liquid thickness. Maps to a fixed surface height fraction of
/// a unit block; a liquid cell with liquid directly above it always
/// renders at full height regardless of its own strength.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FlowStrength {
    Weak,
    Strong,
    Source,
}

impl FlowStrength {
    #[inline]
    pub fn surface_height(self) -> f32 {
        match self {
            FlowStrength::Weak => 0.1,
            FlowStrength::Strong => 0.5,
            FlowStrength::Source => 0.9,
        }
    }

    /// Two-bit encoding used by the liquid surface grid (0 = no liquid).
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            FlowStrength::Weak => 1,
            FlowStrength::Strong => 2,
            FlowStrength::Source => 3,
        }
    }

    #[inline]
    pub fn from_code(code: u8) -> Option<FlowStrength> {
        match code & 3 {
            1 => Some(FlowStrength::Weak),
            2 => Some(FlowStrength::Strong),
            3 => Some(FlowStrength::Source),
            _ => None,
        }
    }
}

/// One axis-aligned box of a complex block model, in unit-cell fractions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// Multi-box model for blocks that are not plain cubes (torches, plants,
/// pedestals). Model blocks never occlude neighbors and are lit from the
/// blocks around them since they have interior surfaces on all sides.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockModel {
    pub boxes: Vec<ModelBox>,
}

/// An item stack dropped on the ground inside a block cell.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ItemStack {
    pub item: u16,
    pub count: u8,
}

#[derive(Clone, Debug)]
pub struct BlockType {
    pub name: String,
    pub opacity: Opacity,
    pub liquid: Option<FlowStrength>,
    pub model: Option<BlockModel>,
    /// Orientable blocks rotate their side-face textures by the per-block
    /// orientation aspect (quarter turns).
    pub orientable: bool,
}

impl BlockType {
    pub fn solid(name: &str) -> Self {
        Self {
            name: name.to_string(),
            opacity: Opacity::Opaque,
            liquid: None,
            model: None,
            orientable: false,
        }
    }

    pub fn transparent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            opacity: Opacity::Transparent,
            liquid: None,
            model: None,
            orientable: false,
        }
    }

    pub fn liquid(name: &str, strength: FlowStrength) -> Self {
        Self {
            name: name.to_string(),
            opacity: Opacity::Transparent,
            liquid: Some(strength),
            model: None,
            orientable: false,
        }
    }

    pub fn with_model(mut self, model: BlockModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn orientable(mut self) -> Self {
        self.orientable = true;
        self
    }
}
