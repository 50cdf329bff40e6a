//! Semantic GX pixel pipeline state.
//!
//! These types are what the register decoder produces; see
//! [`crate::formats::gpu::registers`] for the bit layouts.

use serde::Serialize;

use super::enums::{
    AlphaOp, BlendModeFactor, BlendModeType, ColorSource, Compare, DiffuseFunction,
    IndTexAlphaSel, IndTexBiasSel, IndTexFormat, IndTexMtxId, IndTexScale, IndTexWrap, LogicOp,
    RasColorChannel, TevAlphaArg, TevBias, TevColorArg, TevOp, TevReg, TevScale, TexGenSrc,
    TexGenType, TexInputForm,
};

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub const fn from_u32(v: u32) -> Self {
        Self::new((v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    #[must_use]
    pub const fn to_u32(self) -> u32 {
        (self.r as u32) << 24 | (self.g as u32) << 16 | (self.b as u32) << 8 | self.a as u32
    }
}

/// Signed 11-bit-per-channel TEV register color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColorS10 {
    pub r: i16,
    pub g: i16,
    pub b: i16,
    pub a: i16,
}

/// Outcome of evaluating an alpha test without pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlphaTestResult {
    Undetermined,
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlphaComparison {
    pub comp_left: Compare,
    pub ref_left: u8,
    pub op: AlphaOp,
    pub comp_right: Compare,
    pub ref_right: u8,
}

impl AlphaComparison {
    /// Statically evaluate the test from the `Always`/`Never` sides alone.
    ///
    /// `And` fails on any `Never` and `Or` passes on any `Always`, whatever
    /// the other comparison is. `Xor`/`Xnor` need both sides decided.
    #[must_use]
    pub fn test_result(&self) -> AlphaTestResult {
        use AlphaTestResult::{Fail, Pass, Undetermined};
        use Compare::{Always, Never};

        let l = self.comp_left;
        let r = self.comp_right;
        let mixed = matches!((l, r), (Always, Never) | (Never, Always));
        let same = matches!((l, r), (Always, Always) | (Never, Never));

        match self.op {
            AlphaOp::And if l == Always && r == Always => Pass,
            AlphaOp::And if l == Never || r == Never => Fail,
            AlphaOp::Or if l == Always || r == Always => Pass,
            AlphaOp::Or if l == Never && r == Never => Fail,
            AlphaOp::Xor if mixed => Pass,
            AlphaOp::Xor if same => Fail,
            AlphaOp::Xnor if mixed => Fail,
            AlphaOp::Xnor if same => Pass,
            _ => Undetermined,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZMode {
    pub compare: bool,
    pub function: Compare,
    pub update: bool,
}

impl Default for ZMode {
    fn default() -> Self {
        Self {
            compare: true,
            function: Compare::LEqual,
            update: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlendMode {
    #[serde(rename = "type")]
    pub ty: BlendModeType,
    pub source: BlendModeFactor,
    pub dest: BlendModeFactor,
    pub logic: LogicOp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DstAlpha {
    pub enabled: bool,
    pub alpha: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColorStage {
    pub a: TevColorArg,
    pub b: TevColorArg,
    pub c: TevColorArg,
    pub d: TevColorArg,
    pub formula: TevOp,
    pub bias: TevBias,
    pub scale: TevScale,
    pub clamp: bool,
    pub out: TevReg,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlphaStage {
    pub a: TevAlphaArg,
    pub b: TevAlphaArg,
    pub c: TevAlphaArg,
    pub d: TevAlphaArg,
    pub formula: TevOp,
    pub bias: TevBias,
    pub scale: TevScale,
    pub clamp: bool,
    pub out: TevReg,
}

/// Texture/raster inputs of one TEV stage (`RAS1_TREF` half).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RasOrder {
    pub tex_map: u8,
    pub tex_coord: u8,
    pub tex_enabled: bool,
    pub ras_channel: RasColorChannel,
}

/// Indirect texturing parameters of one TEV stage (`IND_CMD`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TevIndirect {
    pub stage: u8,
    pub format: IndTexFormat,
    pub bias: IndTexBiasSel,
    pub matrix: IndTexMtxId,
    pub wrap_s: IndTexWrap,
    pub wrap_t: IndTexWrap,
    pub add_prev: bool,
    pub utc_lod: bool,
    pub alpha: IndTexAlphaSel,
}

/// Konst color selector: 0-7 are fractions, 0x0C-0x1F select K0-K3 channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KonstColorSel(pub u8);

impl KonstColorSel {
    #[must_use]
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0..=7 | 0x0C..=0x1F => Some(Self(v as u8)),
            _ => None,
        }
    }
}

/// Konst alpha selector: 0-7 are fractions, 0x10-0x1F select K0-K3 channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KonstAlphaSel(pub u8);

impl KonstAlphaSel {
    #[must_use]
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0..=7 | 0x10..=0x1F => Some(Self(v as u8)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TevStage {
    pub order: RasOrder,
    pub color: ColorStage,
    pub alpha: AlphaStage,
    pub konst_color: KonstColorSel,
    pub konst_alpha: KonstAlphaSel,
    pub ras_swap: u8,
    pub tex_swap: u8,
    pub indirect: TevIndirect,
}

/// Channel swizzle; each component selects r/g/b/a (0-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapTableEntry {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for SwapTableEntry {
    fn default() -> Self {
        Self { r: 0, g: 1, b: 2, a: 3 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AttenuationFunction {
    #[default]
    None,
    Specular,
    Spot,
}

/// One lighting channel control (`XF_COLOR0CNTRL` and friends).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelControl {
    pub enabled: bool,
    pub ambient: ColorSource,
    pub material: ColorSource,
    pub light_mask: u8,
    pub diffuse: DiffuseFunction,
    pub attenuation: AttenuationFunction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelData {
    pub material_color: Color,
    pub ambient_color: Color,
    pub color_control: ChannelControl,
    pub alpha_control: ChannelControl,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TexCoordGen {
    pub func: TexGenType,
    pub source: TexGenSrc,
    pub projection_stq: bool,
    pub input_form: TexInputForm,
    pub emboss_source: u8,
    pub emboss_light: u8,
    pub post_matrix: u8,
    pub normalize: bool,
}

/// Indirect texture stage (`RAS1_IREF` + `RAS1_SS`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndirectStage {
    pub tex_map: u8,
    pub tex_coord: u8,
    pub scale_s: IndTexScale,
    pub scale_t: IndTexScale,
}

/// Register-derived state of one material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GxMaterial {
    pub channels: Vec<ChannelData>,
    pub tex_gens: Vec<TexCoordGen>,
    pub tev_stages: Vec<TevStage>,
    pub indirect_stages: Vec<IndirectStage>,
    pub swap_table: [SwapTableEntry; 4],
    pub tev_colors: [ColorS10; 4],
    pub konst_colors: [Color; 4],
    pub alpha_compare: AlphaComparison,
    pub z_mode: ZMode,
    pub blend_mode: BlendMode,
    pub dst_alpha: DstAlpha,
}

impl Default for GxMaterial {
    /// Single-channel, single-stage material passing the rasterized color.
    fn default() -> Self {
        let stage = TevStage {
            order: RasOrder {
                ras_channel: RasColorChannel::Color0A0,
                ..RasOrder::default()
            },
            color: ColorStage {
                d: TevColorArg::RasC,
                ..ColorStage::default()
            },
            alpha: AlphaStage {
                d: TevAlphaArg::RasA,
                ..AlphaStage::default()
            },
            ..TevStage::default()
        };
        Self {
            channels: vec![ChannelData {
                material_color: Color::new(255, 255, 255, 255),
                ..ChannelData::default()
            }],
            tex_gens: Vec::new(),
            tev_stages: vec![stage],
            indirect_stages: Vec::new(),
            swap_table: [SwapTableEntry::default(); 4],
            tev_colors: [ColorS10::default(); 4],
            konst_colors: [Color::default(); 4],
            alpha_compare: AlphaComparison::default(),
            z_mode: ZMode::default(),
            blend_mode: BlendMode::default(),
            dst_alpha: DstAlpha::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(l: Compare, op: AlphaOp, r: Compare) -> AlphaTestResult {
        AlphaComparison {
            comp_left: l,
            op,
            comp_right: r,
            ..AlphaComparison::default()
        }
        .test_result()
    }

    #[test]
    fn test_alpha_and_or() {
        use Compare::{Always, Never};
        assert_eq!(cmp(Always, AlphaOp::And, Always), AlphaTestResult::Pass);
        assert_eq!(cmp(Always, AlphaOp::And, Never), AlphaTestResult::Fail);
        assert_eq!(cmp(Never, AlphaOp::Or, Always), AlphaTestResult::Pass);
        assert_eq!(cmp(Never, AlphaOp::Or, Never), AlphaTestResult::Fail);
    }

    #[test]
    fn test_alpha_xor_xnor() {
        use Compare::{Always, Never};
        assert_eq!(cmp(Always, AlphaOp::Xor, Never), AlphaTestResult::Pass);
        assert_eq!(cmp(Never, AlphaOp::Xor, Never), AlphaTestResult::Fail);
        assert_eq!(cmp(Always, AlphaOp::Xnor, Never), AlphaTestResult::Fail);
        assert_eq!(cmp(Never, AlphaOp::Xnor, Always), AlphaTestResult::Fail);
        assert_eq!(cmp(Always, AlphaOp::Xnor, Always), AlphaTestResult::Pass);
        assert_eq!(cmp(Never, AlphaOp::Xnor, Never), AlphaTestResult::Pass);
    }

    #[test]
    fn test_alpha_one_side_decides() {
        use Compare::{Always, Greater, Less, Never};
        assert_eq!(cmp(Never, AlphaOp::And, Greater), AlphaTestResult::Fail);
        assert_eq!(cmp(Less, AlphaOp::And, Never), AlphaTestResult::Fail);
        assert_eq!(cmp(Always, AlphaOp::Or, Less), AlphaTestResult::Pass);
        assert_eq!(cmp(Greater, AlphaOp::Or, Always), AlphaTestResult::Pass);
    }

    #[test]
    fn test_alpha_undetermined() {
        use Compare::{Always, Greater, Never};
        assert_eq!(cmp(Greater, AlphaOp::And, Always), AlphaTestResult::Undetermined);
        assert_eq!(cmp(Never, AlphaOp::Or, Greater), AlphaTestResult::Undetermined);
        assert_eq!(cmp(Always, AlphaOp::Xor, Greater), AlphaTestResult::Undetermined);
        assert_eq!(cmp(Never, AlphaOp::Xnor, Greater), AlphaTestResult::Undetermined);
    }

    #[test]
    fn test_color_packing() {
        let c = Color::from_u32(0x11223344);
        assert_eq!(c, Color::new(0x11, 0x22, 0x33, 0x44));
        assert_eq!(c.to_u32(), 0x11223344);
    }
}
