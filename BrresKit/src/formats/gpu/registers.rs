//! Bit layouts of the GX register shapes used by materials and meshes.
//!
//! Every shape decodes with `from_raw` (rejecting bit patterns with no
//! hardware meaning) and encodes with `to_raw`. Fields are extracted with
//! explicit shift/mask arithmetic.

use crate::error::{Error, Result};
use crate::formats::gx::enums::{
    AlphaOp, BlendModeFactor, BlendModeType, ColorSource, Compare, DiffuseFunction,
    IndTexAlphaSel, IndTexBiasSel, IndTexFormat, IndTexMtxId, IndTexScale, IndTexWrap, LogicOp,
    RasColorChannel, TevAlphaArg, TevBias, TevColorArg, TevOp, TevReg, TevScale, TexGenSrc,
    TexGenType, TexInputForm,
};
use crate::formats::gx::material::{
    AlphaComparison, AlphaStage, AttenuationFunction, BlendMode, ChannelControl, Color, ColorS10,
    ColorStage, DstAlpha, KonstAlphaSel, KonstColorSel, RasOrder, TevIndirect, TexCoordGen, ZMode,
};

/// BP register addresses.
pub mod bp {
    pub const IND_CMD: u8 = 0x10;
    pub const RAS1_SS0: u8 = 0x25;
    pub const RAS1_SS1: u8 = 0x26;
    pub const RAS1_IREF: u8 = 0x27;
    pub const RAS1_TREF: u8 = 0x28;
    pub const ZMODE: u8 = 0x40;
    pub const CMODE0: u8 = 0x41;
    pub const CMODE1: u8 = 0x42;
    pub const TEV_COLOR_ENV: u8 = 0xC0;
    pub const TEV_ALPHA_ENV: u8 = 0xC1;
    pub const TEV_REGISTERL: u8 = 0xE0;
    pub const TEV_REGISTERH: u8 = 0xE1;
    pub const ALPHACOMPARE: u8 = 0xF3;
    pub const TEV_KSEL: u8 = 0xF6;
    pub const BP_MASK: u8 = 0xFE;
}

/// XF register addresses.
pub mod xf {
    pub const INVTXSPEC: u16 = 0x1008;
    pub const NUMCHAN: u16 = 0x1009;
    pub const AMBIENT0: u16 = 0x100A;
    pub const MATERIAL0: u16 = 0x100C;
    pub const COLOR0CNTRL: u16 = 0x100E;
    pub const ALPHA0CNTRL: u16 = 0x1010;
    pub const NUMTEXGENS: u16 = 0x103F;
    pub const TEXMTXINFO: u16 = 0x1040;
    pub const POSTMTXINFO: u16 = 0x1050;
}

/// CP register addresses.
pub mod cp {
    pub const VCD_LO: u8 = 0x50;
    pub const VCD_HI: u8 = 0x60;
    pub const VAT_A: u8 = 0x70;
    pub const VAT_B: u8 = 0x80;
    pub const VAT_C: u8 = 0x90;
}

/// Extract `width` bits starting at `shift`.
#[inline]
#[must_use]
pub const fn bits(raw: u32, shift: u32, width: u32) -> u32 {
    (raw >> shift) & ((1u32 << width) - 1)
}

/// Place the low `width` bits of `value` at `shift`.
#[inline]
#[must_use]
pub const fn place(value: u32, shift: u32, width: u32) -> u32 {
    (value & ((1u32 << width) - 1)) << shift
}

#[inline]
const fn flag(raw: u32, shift: u32) -> bool {
    bits(raw, shift, 1) != 0
}

fn field<T>(
    register: &'static str,
    field: &'static str,
    value: u32,
    decode: fn(u32) -> Option<T>,
) -> Result<T> {
    decode(value).ok_or(Error::InvalidRegister {
        register,
        field,
        value,
    })
}

impl AlphaComparison {
    pub fn from_raw(raw: u32) -> Result<Self> {
        const R: &str = "ALPHACOMPARE";
        Ok(Self {
            ref_left: bits(raw, 0, 8) as u8,
            ref_right: bits(raw, 8, 8) as u8,
            comp_left: field(R, "comp0", bits(raw, 16, 3), Compare::from_u32)?,
            comp_right: field(R, "comp1", bits(raw, 19, 3), Compare::from_u32)?,
            op: field(R, "logic", bits(raw, 22, 2), AlphaOp::from_u32)?,
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        place(u32::from(self.ref_left), 0, 8)
            | place(u32::from(self.ref_right), 8, 8)
            | place(self.comp_left.to_u32(), 16, 3)
            | place(self.comp_right.to_u32(), 19, 3)
            | place(self.op.to_u32(), 22, 2)
    }
}

impl ZMode {
    pub fn from_raw(raw: u32) -> Result<Self> {
        Ok(Self {
            compare: flag(raw, 0),
            function: field("ZMODE", "func", bits(raw, 1, 3), Compare::from_u32)?,
            update: flag(raw, 4),
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        place(u32::from(self.compare), 0, 1)
            | place(self.function.to_u32(), 1, 3)
            | place(u32::from(self.update), 4, 1)
    }
}

impl BlendMode {
    /// Decode `CMODE0`. Logic takes precedence over subtract over blend.
    pub fn from_raw(raw: u32) -> Result<Self> {
        const R: &str = "CMODE0";
        let ty = if flag(raw, 1) {
            BlendModeType::Logic
        } else if flag(raw, 11) {
            BlendModeType::Subtract
        } else if flag(raw, 0) {
            BlendModeType::Blend
        } else {
            BlendModeType::None
        };
        Ok(Self {
            ty,
            dest: field(R, "dstfactor", bits(raw, 5, 3), BlendModeFactor::from_u32)?,
            source: field(R, "srcfactor", bits(raw, 8, 3), BlendModeFactor::from_u32)?,
            logic: field(R, "logicmode", bits(raw, 12, 4), LogicOp::from_u32)?,
        })
    }

    /// Encode `CMODE0` with dithering and both update bits enabled.
    #[must_use]
    pub fn to_raw(&self) -> u32 {
        let blend = matches!(self.ty, BlendModeType::Blend | BlendModeType::Subtract);
        place(u32::from(blend), 0, 1)
            | place(u32::from(self.ty == BlendModeType::Logic), 1, 1)
            | place(1, 2, 1)
            | place(1, 3, 1)
            | place(1, 4, 1)
            | place(self.dest.to_u32(), 5, 3)
            | place(self.source.to_u32(), 8, 3)
            | place(u32::from(self.ty == BlendModeType::Subtract), 11, 1)
            | place(self.logic.to_u32(), 12, 4)
    }
}

impl DstAlpha {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self {
            alpha: bits(raw, 0, 8) as u8,
            enabled: flag(raw, 8),
        }
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        place(u32::from(self.alpha), 0, 8) | place(u32::from(self.enabled), 8, 1)
    }
}

fn decode_formula(
    register: &'static str,
    bias: u32,
    op: u32,
    scale: u32,
) -> Result<(TevOp, TevBias, TevScale)> {
    if bias == 3 {
        let formula = field(register, "op", 8 + (scale << 1 | op), TevOp::from_u32)?;
        return Ok((formula, TevBias::Zero, TevScale::Scale1));
    }
    let formula = if op == 1 { TevOp::Subtract } else { TevOp::Add };
    Ok((
        formula,
        field(register, "bias", bias, TevBias::from_u32)?,
        field(register, "shift", scale, TevScale::from_u32)?,
    ))
}

/// (bias, op, scale) field values.
fn encode_formula(formula: TevOp, bias: TevBias, scale: TevScale) -> (u32, u32, u32) {
    if formula.is_comparison() {
        let v = formula.to_u32() - 8;
        (3, v & 1, v >> 1)
    } else {
        (bias.to_u32(), formula.to_u32(), scale.to_u32())
    }
}

impl ColorStage {
    /// Decode a `TEV_COLOR_ENV` register.
    pub fn from_raw(raw: u32) -> Result<Self> {
        const R: &str = "TEV_COLOR_ENV";
        let (formula, bias, scale) =
            decode_formula(R, bits(raw, 16, 2), bits(raw, 18, 1), bits(raw, 20, 2))?;
        Ok(Self {
            d: field(R, "d", bits(raw, 0, 4), TevColorArg::from_u32)?,
            c: field(R, "c", bits(raw, 4, 4), TevColorArg::from_u32)?,
            b: field(R, "b", bits(raw, 8, 4), TevColorArg::from_u32)?,
            a: field(R, "a", bits(raw, 12, 4), TevColorArg::from_u32)?,
            formula,
            bias,
            scale,
            clamp: flag(raw, 19),
            out: field(R, "dest", bits(raw, 22, 2), TevReg::from_u32)?,
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        let (bias, op, scale) = encode_formula(self.formula, self.bias, self.scale);
        place(self.d.to_u32(), 0, 4)
            | place(self.c.to_u32(), 4, 4)
            | place(self.b.to_u32(), 8, 4)
            | place(self.a.to_u32(), 12, 4)
            | place(bias, 16, 2)
            | place(op, 18, 1)
            | place(u32::from(self.clamp), 19, 1)
            | place(scale, 20, 2)
            | place(self.out.to_u32(), 22, 2)
    }
}

/// `TEV_ALPHA_ENV`: the alpha combiner plus the stage's swap table selectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TevAlphaEnv {
    pub stage: AlphaStage,
    pub ras_swap: u8,
    pub tex_swap: u8,
}

impl TevAlphaEnv {
    pub fn from_raw(raw: u32) -> Result<Self> {
        const R: &str = "TEV_ALPHA_ENV";
        let (formula, bias, scale) =
            decode_formula(R, bits(raw, 16, 2), bits(raw, 18, 1), bits(raw, 20, 2))?;
        Ok(Self {
            ras_swap: bits(raw, 0, 2) as u8,
            tex_swap: bits(raw, 2, 2) as u8,
            stage: AlphaStage {
                d: field(R, "d", bits(raw, 4, 3), TevAlphaArg::from_u32)?,
                c: field(R, "c", bits(raw, 7, 3), TevAlphaArg::from_u32)?,
                b: field(R, "b", bits(raw, 10, 3), TevAlphaArg::from_u32)?,
                a: field(R, "a", bits(raw, 13, 3), TevAlphaArg::from_u32)?,
                formula,
                bias,
                scale,
                clamp: flag(raw, 19),
                out: field(R, "dest", bits(raw, 22, 2), TevReg::from_u32)?,
            },
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        let s = &self.stage;
        let (bias, op, scale) = encode_formula(s.formula, s.bias, s.scale);
        place(u32::from(self.ras_swap), 0, 2)
            | place(u32::from(self.tex_swap), 2, 2)
            | place(s.d.to_u32(), 4, 3)
            | place(s.c.to_u32(), 7, 3)
            | place(s.b.to_u32(), 10, 3)
            | place(s.a.to_u32(), 13, 3)
            | place(bias, 16, 2)
            | place(op, 18, 1)
            | place(u32::from(s.clamp), 19, 1)
            | place(scale, 20, 2)
            | place(s.out.to_u32(), 22, 2)
    }
}

impl TevIndirect {
    /// Decode an `IND_CMD` register.
    pub fn from_raw(raw: u32) -> Result<Self> {
        const R: &str = "IND_CMD";
        Ok(Self {
            stage: bits(raw, 0, 2) as u8,
            format: field(R, "fmt", bits(raw, 2, 2), IndTexFormat::from_u32)?,
            bias: field(R, "bias", bits(raw, 4, 3), IndTexBiasSel::from_u32)?,
            alpha: field(R, "bs", bits(raw, 7, 2), IndTexAlphaSel::from_u32)?,
            matrix: field(R, "mid", bits(raw, 9, 4), IndTexMtxId::from_u32)?,
            wrap_s: field(R, "sw", bits(raw, 13, 3), IndTexWrap::from_u32)?,
            wrap_t: field(R, "tw", bits(raw, 16, 3), IndTexWrap::from_u32)?,
            utc_lod: flag(raw, 19),
            add_prev: flag(raw, 20),
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        place(u32::from(self.stage), 0, 2)
            | place(self.format.to_u32(), 2, 2)
            | place(self.bias.to_u32(), 4, 3)
            | place(self.alpha.to_u32(), 7, 2)
            | place(self.matrix.to_u32(), 9, 4)
            | place(self.wrap_s.to_u32(), 13, 3)
            | place(self.wrap_t.to_u32(), 16, 3)
            | place(u32::from(self.utc_lod), 19, 1)
            | place(u32::from(self.add_prev), 20, 1)
    }
}

/// `RAS1_TREF`: texture and color inputs of two consecutive stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasTref {
    pub orders: [RasOrder; 2],
}

impl RasTref {
    pub fn from_raw(raw: u32) -> Result<Self> {
        let order = |base: u32| -> Result<RasOrder> {
            Ok(RasOrder {
                tex_map: bits(raw, base, 3) as u8,
                tex_coord: bits(raw, base + 3, 3) as u8,
                tex_enabled: flag(raw, base + 6),
                ras_channel: field(
                    "RAS1_TREF",
                    "colorchan",
                    bits(raw, base + 7, 3),
                    RasColorChannel::from_u32,
                )?,
            })
        };
        Ok(Self {
            orders: [order(0)?, order(12)?],
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        let mut raw = 0;
        for (order, base) in self.orders.iter().zip([0, 12]) {
            raw |= place(u32::from(order.tex_map), base, 3)
                | place(u32::from(order.tex_coord), base + 3, 3)
                | place(u32::from(order.tex_enabled), base + 6, 1)
                | place(order.ras_channel.to_u32(), base + 7, 3);
        }
        raw
    }
}

/// `RAS1_IREF`: (texmap, texcoord) of the four indirect stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasIref {
    pub stages: [(u8, u8); 4],
}

impl RasIref {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        let mut stages = [(0, 0); 4];
        for (i, stage) in stages.iter_mut().enumerate() {
            let base = 6 * i as u32;
            *stage = (bits(raw, base, 3) as u8, bits(raw, base + 3, 3) as u8);
        }
        Self { stages }
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        self.stages
            .iter()
            .enumerate()
            .fold(0, |raw, (i, (map, coord))| {
                let base = 6 * i as u32;
                raw | place(u32::from(*map), base, 3) | place(u32::from(*coord), base + 3, 3)
            })
    }
}

/// `RAS1_SS`: (s, t) texcoord scales of two indirect stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasSs {
    pub scales: [(IndTexScale, IndTexScale); 2],
}

impl RasSs {
    pub fn from_raw(raw: u32) -> Result<Self> {
        let scale = |shift| field("RAS1_SS", "scale", bits(raw, shift, 4), IndTexScale::from_u32);
        Ok(Self {
            scales: [(scale(0)?, scale(4)?), (scale(8)?, scale(12)?)],
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        let [(s0, t0), (s1, t1)] = self.scales;
        place(s0.to_u32(), 0, 4)
            | place(t0.to_u32(), 4, 4)
            | place(s1.to_u32(), 8, 4)
            | place(t1.to_u32(), 12, 4)
    }
}

/// `TEV_KSEL`: one swap table half plus konst selectors of two stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TevKSel {
    pub swap_rb: u8,
    pub swap_ga: u8,
    pub konst_color: [KonstColorSel; 2],
    pub konst_alpha: [KonstAlphaSel; 2],
}

impl TevKSel {
    pub fn from_raw(raw: u32) -> Result<Self> {
        const R: &str = "TEV_KSEL";
        Ok(Self {
            swap_rb: bits(raw, 0, 2) as u8,
            swap_ga: bits(raw, 2, 2) as u8,
            konst_color: [
                field(R, "kcsel0", bits(raw, 4, 5), KonstColorSel::from_u32)?,
                field(R, "kcsel1", bits(raw, 14, 5), KonstColorSel::from_u32)?,
            ],
            konst_alpha: [
                field(R, "kasel0", bits(raw, 9, 5), KonstAlphaSel::from_u32)?,
                field(R, "kasel1", bits(raw, 19, 5), KonstAlphaSel::from_u32)?,
            ],
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        place(u32::from(self.swap_rb), 0, 2)
            | place(u32::from(self.swap_ga), 2, 2)
            | place(u32::from(self.konst_color[0].0), 4, 5)
            | place(u32::from(self.konst_alpha[0].0), 9, 5)
            | place(u32::from(self.konst_color[1].0), 14, 5)
            | place(u32::from(self.konst_alpha[1].0), 19, 5)
    }
}

/// Register type bit of `TEV_REGISTERL/H`: set for konst colors.
#[must_use]
pub const fn tev_register_is_konst(raw: u32) -> bool {
    flag(raw, 23)
}

const fn sign_extend_11(v: u32) -> i16 {
    (((v << 21) as i32) >> 21) as i16
}

/// Decode a color register pair (low = red/alpha, high = blue/green).
#[must_use]
pub const fn decode_tev_color(low: u32, high: u32) -> ColorS10 {
    ColorS10 {
        r: sign_extend_11(bits(low, 0, 11)),
        a: sign_extend_11(bits(low, 12, 11)),
        b: sign_extend_11(bits(high, 0, 11)),
        g: sign_extend_11(bits(high, 12, 11)),
    }
}

#[must_use]
pub const fn encode_tev_color(c: ColorS10) -> (u32, u32) {
    let low = place(c.r as i32 as u32, 0, 11) | place(c.a as i32 as u32, 12, 11);
    let high = place(c.b as i32 as u32, 0, 11) | place(c.g as i32 as u32, 12, 11);
    (low, high)
}

/// Decode a konst register pair.
#[must_use]
pub const fn decode_konst_color(low: u32, high: u32) -> Color {
    Color {
        r: bits(low, 0, 8) as u8,
        a: bits(low, 12, 8) as u8,
        b: bits(high, 0, 8) as u8,
        g: bits(high, 12, 8) as u8,
    }
}

#[must_use]
pub const fn encode_konst_color(c: Color) -> (u32, u32) {
    let konst = place(1, 23, 1);
    let low = place(c.r as u32, 0, 11) | place(c.a as u32, 12, 11) | konst;
    let high = place(c.b as u32, 0, 11) | place(c.g as u32, 12, 11) | konst;
    (low, high)
}

impl TexCoordGen {
    /// Decode an XF `TEXMTXINFO`/`POSTMTXINFO` pair.
    pub fn from_raw(info: u32, post: u32) -> Result<Self> {
        const R: &str = "TEXMTXINFO";
        Ok(Self {
            projection_stq: flag(info, 1),
            input_form: field(R, "inputform", bits(info, 2, 2), TexInputForm::from_u32)?,
            func: field(R, "texgentype", bits(info, 4, 3), TexGenType::from_u32)?,
            source: field(R, "sourcerow", bits(info, 7, 5), TexGenSrc::from_u32)?,
            emboss_source: bits(info, 12, 3) as u8,
            emboss_light: bits(info, 15, 3) as u8,
            post_matrix: bits(post, 0, 8) as u8,
            normalize: flag(post, 8),
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> (u32, u32) {
        let info = place(u32::from(self.projection_stq), 1, 1)
            | place(self.input_form.to_u32(), 2, 2)
            | place(self.func.to_u32(), 4, 3)
            | place(self.source.to_u32(), 7, 5)
            | place(u32::from(self.emboss_source), 12, 3)
            | place(u32::from(self.emboss_light), 15, 3);
        let post = place(u32::from(self.post_matrix), 0, 8) | place(u32::from(self.normalize), 8, 1);
        (info, post)
    }
}

impl ChannelControl {
    /// Decode an XF `COLOR/ALPHA CNTRL` register.
    pub fn from_raw(raw: u32) -> Result<Self> {
        const R: &str = "LitChannel";
        let attenuation = match (flag(raw, 9), flag(raw, 10)) {
            (false, _) => AttenuationFunction::None,
            (true, false) => AttenuationFunction::Specular,
            (true, true) => AttenuationFunction::Spot,
        };
        Ok(Self {
            material: field(R, "matsrc", bits(raw, 0, 1), ColorSource::from_u32)?,
            enabled: flag(raw, 1),
            ambient: field(R, "ambsrc", bits(raw, 6, 1), ColorSource::from_u32)?,
            diffuse: field(R, "diffuseatten", bits(raw, 7, 2), DiffuseFunction::from_u32)?,
            light_mask: (bits(raw, 2, 4) | bits(raw, 11, 4) << 4) as u8,
            attenuation,
        })
    }

    #[must_use]
    pub fn to_raw(&self) -> u32 {
        let (enable, select) = match self.attenuation {
            AttenuationFunction::None => (0, 1),
            AttenuationFunction::Specular => (1, 0),
            AttenuationFunction::Spot => (1, 1),
        };
        let mask = u32::from(self.light_mask);
        place(self.material.to_u32(), 0, 1)
            | place(u32::from(self.enabled), 1, 1)
            | place(mask, 2, 4)
            | place(self.ambient.to_u32(), 6, 1)
            | place(self.diffuse.to_u32(), 7, 2)
            | place(enable, 9, 1)
            | place(select, 10, 1)
            | place(mask >> 4, 11, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_compare_layout() {
        let raw = 0x10 | 0x80 << 8 | 4 << 16 | 7 << 19 | 1 << 22;
        let ac = AlphaComparison::from_raw(raw).unwrap();
        assert_eq!(ac.ref_left, 0x10);
        assert_eq!(ac.ref_right, 0x80);
        assert_eq!(ac.comp_left, Compare::Greater);
        assert_eq!(ac.comp_right, Compare::Always);
        assert_eq!(ac.op, AlphaOp::Or);
        assert_eq!(ac.to_raw(), raw);
    }

    #[test]
    fn test_blend_precedence() {
        // blend + subtract + logic all set: logic wins
        let raw = 1 | 1 << 1 | 1 << 11;
        assert_eq!(BlendMode::from_raw(raw).unwrap().ty, BlendModeType::Logic);
        let raw = 1 | 1 << 11;
        assert_eq!(BlendMode::from_raw(raw).unwrap().ty, BlendModeType::Subtract);
        assert_eq!(BlendMode::from_raw(1).unwrap().ty, BlendModeType::Blend);
        assert_eq!(BlendMode::from_raw(0).unwrap().ty, BlendModeType::None);
    }

    #[test]
    fn test_blend_subtract_sets_enable() {
        let mode = BlendMode {
            ty: BlendModeType::Subtract,
            ..BlendMode::default()
        };
        let raw = mode.to_raw();
        assert!(flag(raw, 0));
        assert!(flag(raw, 11));
        assert_eq!(BlendMode::from_raw(raw).unwrap(), mode);
    }

    #[test]
    fn test_color_stage_comparison_formula() {
        let stage = ColorStage {
            a: TevColorArg::TexC,
            d: TevColorArg::RasC,
            formula: TevOp::CompGr16Eq,
            out: TevReg::Reg1,
            ..ColorStage::default()
        };
        let raw = stage.to_raw();
        assert_eq!(bits(raw, 16, 2), 3);
        assert_eq!(ColorStage::from_raw(raw).unwrap(), stage);
    }

    #[test]
    fn test_alpha_env_swaps() {
        let env = TevAlphaEnv {
            ras_swap: 2,
            tex_swap: 1,
            stage: AlphaStage {
                a: TevAlphaArg::TexA,
                formula: TevOp::Subtract,
                bias: TevBias::SubHalf,
                scale: TevScale::Divide2,
                clamp: true,
                ..AlphaStage::default()
            },
        };
        assert_eq!(TevAlphaEnv::from_raw(env.to_raw()).unwrap(), env);
    }

    #[test]
    fn test_indirect_invalid_fields() {
        // matrix id 4 is a hole
        assert!(TevIndirect::from_raw(4 << 9).is_err());
        // wrap 7 is invalid
        assert!(TevIndirect::from_raw(7 << 13).is_err());
        let ind = TevIndirect {
            stage: 2,
            matrix: IndTexMtxId::T1,
            wrap_s: IndTexWrap::Wrap0,
            add_prev: true,
            ..TevIndirect::default()
        };
        assert_eq!(TevIndirect::from_raw(ind.to_raw()).unwrap(), ind);
    }

    #[test]
    fn test_tref_second_stage() {
        let raw = 3 << 12 | 5 << 15 | 1 << 18 | 1 << 19;
        let tref = RasTref::from_raw(raw).unwrap();
        assert_eq!(tref.orders[1].tex_map, 3);
        assert_eq!(tref.orders[1].tex_coord, 5);
        assert!(tref.orders[1].tex_enabled);
        assert_eq!(tref.orders[1].ras_channel, RasColorChannel::Color1A1);
        // channel 0 in stage 0 is Color0A0, which is fine
        assert_eq!(tref.to_raw(), raw);
        assert!(RasTref::from_raw(3 << 7).is_err());
    }

    #[test]
    fn test_ksel_ranges() {
        assert!(TevKSel::from_raw(8 << 4).is_err());
        assert!(TevKSel::from_raw(0x0C << 4).is_ok());
        assert!(TevKSel::from_raw(0x0C << 9).is_err());
        assert!(TevKSel::from_raw(0x10 << 9).is_ok());
    }

    #[test]
    fn test_tev_color_sign() {
        let c = ColorS10 { r: -1024, g: 1023, b: -1, a: 255 };
        let (low, high) = encode_tev_color(c);
        assert!(!tev_register_is_konst(low));
        assert_eq!(decode_tev_color(low, high), c);

        let k = Color::new(1, 2, 3, 4);
        let (low, high) = encode_konst_color(k);
        assert!(tev_register_is_konst(high));
        assert_eq!(decode_konst_color(low, high), k);
    }

    #[test]
    fn test_texgen_ranges() {
        assert!(TexCoordGen::from_raw(4 << 4, 0).is_err());
        assert!(TexCoordGen::from_raw(13 << 7, 0).is_err());
        assert!(TexCoordGen::from_raw(2 << 2, 0).is_err());
        let texgen = TexCoordGen {
            source: TexGenSrc::Tex3,
            func: TexGenType::EmbossMap,
            emboss_light: 2,
            post_matrix: 61,
            normalize: true,
            ..TexCoordGen::default()
        };
        let (info, post) = texgen.to_raw();
        assert_eq!(TexCoordGen::from_raw(info, post).unwrap(), texgen);
    }

    #[test]
    fn test_lit_channel_attenuation() {
        let ctrl = ChannelControl::from_raw(0).unwrap();
        assert_eq!(ctrl.attenuation, AttenuationFunction::None);
        assert_eq!(
            ChannelControl::from_raw(1 << 9).unwrap().attenuation,
            AttenuationFunction::Specular
        );
        assert!(ChannelControl::from_raw(3 << 7).is_err());

        let ctrl = ChannelControl {
            enabled: true,
            material: ColorSource::Vertex,
            light_mask: 0b1010_0101,
            attenuation: AttenuationFunction::Spot,
            diffuse: DiffuseFunction::Clamp,
            ..ChannelControl::default()
        };
        assert_eq!(ChannelControl::from_raw(ctrl.to_raw()).unwrap(), ctrl);
        let none = ChannelControl::default().to_raw();
        assert!(flag(none, 10));
    }

    #[test]
    fn test_ss_range() {
        assert!(RasSs::from_raw(9).is_err());
        let ss = RasSs {
            scales: [(IndTexScale::Div2, IndTexScale::Div256), (IndTexScale::Div1, IndTexScale::Div8)],
        };
        assert_eq!(RasSs::from_raw(ss.to_raw()).unwrap(), ss);
    }
}
