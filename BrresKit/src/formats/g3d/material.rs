//! Material records.
//!
//! The fixed-function state of a material lives in a display list of BP/XF
//! register loads. Reading replays it through a [`RegisterStateHandler`] and
//! decodes each register; writing encodes the [`GxMaterial`] back into loads.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;

use super::io::{cursor_at, read_name, resolve};
use super::section::Section;
use crate::error::{Error, Result};
use crate::formats::gpu::registers::{
    RasIref, RasSs, RasTref, TevAlphaEnv, TevKSel, bp, decode_konst_color, decode_tev_color,
    encode_konst_color, encode_tev_color, xf,
};
use crate::formats::gpu::{DisplayListWriter, RegisterStateHandler, run_display_list};
use crate::formats::gx::{
    AlphaComparison, AnisotropyLevel, BlendMode, ChannelControl, ChannelData, Color, ColorStage,
    CullMode, DstAlpha, GxMaterial, IndirectStage, SwapTableEntry, TevIndirect, TevStage,
    TexCoordGen, TextureFilter, TextureWrap, ZMode,
};

pub const MAX_TEV_STAGES: usize = 16;
pub const MAX_TEX_GENS: usize = 8;
pub const MAX_CHANNELS: usize = 2;
pub const MAX_INDIRECT_STAGES: usize = 4;

const SAMPLER_SIZE: usize = 0x24;
const MATERIAL_HEADER_SIZE: usize = 0x30;
/// CMODE0 bits written by materials; dither and the update flags are excluded.
const CMODE0_MASK: u32 = 0xFFE3;

/// Texture binding of one texmap slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sampler {
    pub texture: String,
    pub palette: String,
    pub wrap_u: TextureWrap,
    pub wrap_v: TextureWrap,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub lod_bias: f32,
    pub max_anisotropy: AnisotropyLevel,
}

impl Sampler {
    #[must_use]
    pub fn new(texture: impl Into<String>) -> Self {
        Self {
            texture: texture.into(),
            palette: String::new(),
            wrap_u: TextureWrap::Repeat,
            wrap_v: TextureWrap::Repeat,
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            lod_bias: 0.0,
            max_anisotropy: AnisotropyLevel::X1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    pub name: String,
    pub id: u32,
    /// Drawn in the translucent pass.
    pub xlu: bool,
    pub cull_mode: CullMode,
    pub early_z: bool,
    pub light_set: i8,
    pub fog: i8,
    pub samplers: Vec<Sampler>,
    pub gx: GxMaterial,
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: 0,
            xlu: false,
            cull_mode: CullMode::Back,
            early_z: false,
            light_set: -1,
            fog: -1,
            samplers: Vec::new(),
            gx: GxMaterial::default(),
        }
    }
}

fn invalid(name: &str, message: impl Into<String>) -> Error {
    Error::InvalidMaterial {
        name: name.to_string(),
        message: message.into(),
    }
}

fn read_sampler(data: &[u8], start: u64, material: &str) -> Result<Sampler> {
    let mut r = cursor_at(data, start)?;
    let texture_offset = r.read_i32::<BigEndian>()?;
    let palette_offset = r.read_i32::<BigEndian>()?;
    let _texmap = r.read_u32::<BigEndian>()?;
    let wrap_u = r.read_u32::<BigEndian>()?;
    let wrap_v = r.read_u32::<BigEndian>()?;
    let min = r.read_u32::<BigEndian>()?;
    let mag = r.read_u32::<BigEndian>()?;
    let lod_bias = r.read_f32::<BigEndian>()?;
    let aniso = r.read_u32::<BigEndian>()?;

    let bad = |what: &str, v: u32| invalid(material, format!("sampler {what} {v} is invalid"));
    Ok(Sampler {
        texture: read_name(data, start, texture_offset)?,
        palette: read_name(data, start, palette_offset)?,
        wrap_u: TextureWrap::from_u32(wrap_u).ok_or_else(|| bad("wrap_u", wrap_u))?,
        wrap_v: TextureWrap::from_u32(wrap_v).ok_or_else(|| bad("wrap_v", wrap_v))?,
        min_filter: TextureFilter::from_u32(min).ok_or_else(|| bad("min filter", min))?,
        mag_filter: TextureFilter::from_u32(mag).ok_or_else(|| bad("mag filter", mag))?,
        lod_bias,
        max_anisotropy: AnisotropyLevel::from_u32(aniso)
            .ok_or_else(|| bad("anisotropy", aniso))?,
    })
}

/// Decode the material record at `start`.
pub fn read_material(data: &[u8], start: u64) -> Result<Material> {
    let mut r = cursor_at(data, start)?;
    let _size = r.read_u32::<BigEndian>()?;
    let _model_offset = r.read_i32::<BigEndian>()?;
    let name_offset = r.read_i32::<BigEndian>()?;
    let name = read_name(data, start, name_offset)?;
    let id = r.read_u32::<BigEndian>()?;
    let flag = r.read_u32::<BigEndian>()?;
    let counts = [r.read_u8()?, r.read_u8()?, r.read_u8()?, r.read_u8()?];
    let raw_cull = r.read_u32::<BigEndian>()?;
    let early_z = r.read_u8()? != 0;
    let light_set = r.read_i8()?;
    let fog = r.read_i8()?;
    let _pad = r.read_u8()?;
    let sampler_count = r.read_u32::<BigEndian>()?;
    let sampler_offset = r.read_i32::<BigEndian>()?;
    let dl_size = r.read_u32::<BigEndian>()?;
    let dl_offset = r.read_i32::<BigEndian>()?;

    let [tex_gens, channels, tev_stages, indirect_stages] = counts.map(usize::from);
    if tex_gens > MAX_TEX_GENS
        || channels > MAX_CHANNELS
        || tev_stages > MAX_TEV_STAGES
        || indirect_stages > MAX_INDIRECT_STAGES
    {
        return Err(invalid(&name, format!("stage counts {counts:?} exceed hardware limits")));
    }
    let cull_mode = CullMode::from_u32(raw_cull)
        .ok_or_else(|| invalid(&name, format!("cull mode {raw_cull} is invalid")))?;

    let sampler_bytes = (sampler_count as usize).saturating_mul(SAMPLER_SIZE);
    resolve(data, start, i64::from(sampler_offset), sampler_bytes).map_err(|_| {
        invalid(&name, format!("{sampler_count} samplers do not fit in the buffer"))
    })?;
    let mut samplers = Vec::with_capacity(sampler_count as usize);
    for i in 0..u64::from(sampler_count) {
        let at = resolve(
            data,
            start,
            i64::from(sampler_offset) + (i * SAMPLER_SIZE as u64) as i64,
            SAMPLER_SIZE,
        )?;
        samplers.push(read_sampler(data, at, &name)?);
    }

    let dl_start = resolve(data, start, i64::from(dl_offset), dl_size as usize)?;
    let mut state = RegisterStateHandler::default();
    let mut cursor = Cursor::new(data);
    cursor.set_position(dl_start);
    run_display_list(&mut cursor, &mut state, dl_size)?;

    let gx = decode_gx_material(&state, tex_gens, channels, tev_stages, indirect_stages)
        .map_err(|e| invalid(&name, e.to_string()))?;

    tracing::debug!(
        "Read material '{}' ({} stages, {} samplers)",
        name,
        tev_stages,
        samplers.len()
    );
    Ok(Material {
        name,
        id,
        xlu: flag & 0x8000_0000 != 0,
        cull_mode,
        early_z,
        light_set,
        fog,
        samplers,
        gx,
    })
}

/// Rebuild semantic material state from replayed register writes.
pub fn decode_gx_material(
    state: &RegisterStateHandler,
    tex_gens: usize,
    channels: usize,
    tev_stages: usize,
    indirect_stages: usize,
) -> Result<GxMaterial> {
    let ksel = (0..8u8)
        .map(|i| TevKSel::from_raw(state.bp_reg(bp::TEV_KSEL + i)))
        .collect::<Result<Vec<_>>>()?;

    let mut swap_table = [SwapTableEntry::default(); 4];
    for (i, entry) in swap_table.iter_mut().enumerate() {
        let (lo, hi) = (&ksel[2 * i], &ksel[2 * i + 1]);
        *entry = SwapTableEntry {
            r: lo.swap_rb,
            g: lo.swap_ga,
            b: hi.swap_rb,
            a: hi.swap_ga,
        };
    }

    let mut stages = Vec::with_capacity(tev_stages);
    for n in 0..tev_stages {
        let n8 = n as u8;
        let color = ColorStage::from_raw(state.bp_reg(bp::TEV_COLOR_ENV + 2 * n8))?;
        let alpha = TevAlphaEnv::from_raw(state.bp_reg(bp::TEV_ALPHA_ENV + 2 * n8))?;
        let tref = RasTref::from_raw(state.bp_reg(bp::RAS1_TREF + n8 / 2))?;
        let indirect = TevIndirect::from_raw(state.bp_reg(bp::IND_CMD + n8))?;
        let k = &ksel[n / 2];
        stages.push(TevStage {
            order: tref.orders[n % 2],
            color,
            alpha: alpha.stage,
            konst_color: k.konst_color[n % 2],
            konst_alpha: k.konst_alpha[n % 2],
            ras_swap: alpha.ras_swap,
            tex_swap: alpha.tex_swap,
            indirect,
        });
    }

    let iref = RasIref::from_raw(state.bp_reg(bp::RAS1_IREF));
    let ss = [
        RasSs::from_raw(state.bp_reg(bp::RAS1_SS0))?,
        RasSs::from_raw(state.bp_reg(bp::RAS1_SS1))?,
    ];
    let indirect = (0..indirect_stages)
        .map(|i| {
            let (tex_map, tex_coord) = iref.stages[i];
            let (scale_s, scale_t) = ss[i / 2].scales[i % 2];
            IndirectStage {
                tex_map,
                tex_coord,
                scale_s,
                scale_t,
            }
        })
        .collect();

    let channel_data = (0..channels as u16)
        .map(|i| {
            Ok(ChannelData {
                material_color: Color::from_u32(state.xf_reg(xf::MATERIAL0 + i)),
                ambient_color: Color::from_u32(state.xf_reg(xf::AMBIENT0 + i)),
                color_control: ChannelControl::from_raw(state.xf_reg(xf::COLOR0CNTRL + i))?,
                alpha_control: ChannelControl::from_raw(state.xf_reg(xf::ALPHA0CNTRL + i))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let gens = (0..tex_gens as u16)
        .map(|i| {
            TexCoordGen::from_raw(
                state.xf_reg(xf::TEXMTXINFO + i),
                state.xf_reg(xf::POSTMTXINFO + i),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tev_colors = [Default::default(); 4];
    let mut konst_colors = [Color::default(); 4];
    for i in 0..4 {
        let (lo, hi) = state.tev_colors[i];
        tev_colors[i] = decode_tev_color(lo, hi);
        let (lo, hi) = state.konst_colors[i];
        konst_colors[i] = decode_konst_color(lo, hi);
    }

    Ok(GxMaterial {
        channels: channel_data,
        tex_gens: gens,
        tev_stages: stages,
        indirect_stages: indirect,
        swap_table,
        tev_colors,
        konst_colors,
        alpha_compare: AlphaComparison::from_raw(state.bp_reg(bp::ALPHACOMPARE))?,
        z_mode: ZMode::from_raw(state.bp_reg(bp::ZMODE))?,
        blend_mode: BlendMode::from_raw(state.bp_reg(bp::CMODE0))?,
        dst_alpha: DstAlpha::from_raw(state.bp_reg(bp::CMODE1)),
    })
}

/// Encode `mat` as the register display list of a material.
pub fn encode_gx_material(mat: &GxMaterial) -> Result<Vec<u8>> {
    let mut dl = DisplayListWriter::new();
    dl.load_bp(bp::ALPHACOMPARE, mat.alpha_compare.to_raw());
    dl.load_bp(bp::ZMODE, mat.z_mode.to_raw());
    dl.bp_mask(CMODE0_MASK);
    dl.load_bp(bp::CMODE0, mat.blend_mode.to_raw());
    dl.load_bp(bp::CMODE1, mat.dst_alpha.to_raw());

    for i in 0..4u8 {
        let (lo, hi) = encode_tev_color(mat.tev_colors[usize::from(i)]);
        dl.load_bp(bp::TEV_REGISTERL + 2 * i, lo);
        dl.load_bp(bp::TEV_REGISTERH + 2 * i, hi);
        let (lo, hi) = encode_konst_color(mat.konst_colors[usize::from(i)]);
        dl.load_bp(bp::TEV_REGISTERL + 2 * i, lo);
        dl.load_bp(bp::TEV_REGISTERH + 2 * i, hi);
    }

    for k in 0..8usize {
        let entry = mat.swap_table[k / 2];
        let (swap_rb, swap_ga) = if k % 2 == 0 {
            (entry.r, entry.g)
        } else {
            (entry.b, entry.a)
        };
        let stage = |s: usize| mat.tev_stages.get(s).copied().unwrap_or_default();
        let (s0, s1) = (stage(2 * k), stage(2 * k + 1));
        let ksel = TevKSel {
            swap_rb,
            swap_ga,
            konst_color: [s0.konst_color, s1.konst_color],
            konst_alpha: [s0.konst_alpha, s1.konst_alpha],
        };
        dl.load_bp(bp::TEV_KSEL + k as u8, ksel.to_raw());
    }

    for (pair, stages) in mat.tev_stages.chunks(2).enumerate() {
        let mut tref = RasTref::default();
        for (slot, stage) in stages.iter().enumerate() {
            tref.orders[slot] = stage.order;
        }
        dl.load_bp(bp::RAS1_TREF + pair as u8, tref.to_raw());
    }
    for (n, stage) in mat.tev_stages.iter().enumerate() {
        let n = n as u8;
        dl.load_bp(bp::TEV_COLOR_ENV + 2 * n, stage.color.to_raw());
        let alpha = TevAlphaEnv {
            stage: stage.alpha,
            ras_swap: stage.ras_swap,
            tex_swap: stage.tex_swap,
        };
        dl.load_bp(bp::TEV_ALPHA_ENV + 2 * n, alpha.to_raw());
        dl.load_bp(bp::IND_CMD + n, stage.indirect.to_raw());
    }

    let mut iref = RasIref::default();
    let mut ss = [RasSs::default(); 2];
    for (i, stage) in mat.indirect_stages.iter().enumerate() {
        iref.stages[i] = (stage.tex_map, stage.tex_coord);
        ss[i / 2].scales[i % 2] = (stage.scale_s, stage.scale_t);
    }
    dl.load_bp(bp::RAS1_IREF, iref.to_raw());
    dl.load_bp(bp::RAS1_SS0, ss[0].to_raw());
    dl.load_bp(bp::RAS1_SS1, ss[1].to_raw());

    for (i, ch) in mat.channels.iter().enumerate() {
        let i = i as u16;
        dl.load_xf(xf::MATERIAL0 + i, &[ch.material_color.to_u32()])?;
        dl.load_xf(xf::AMBIENT0 + i, &[ch.ambient_color.to_u32()])?;
        dl.load_xf(xf::COLOR0CNTRL + i, &[ch.color_control.to_raw()])?;
        dl.load_xf(xf::ALPHA0CNTRL + i, &[ch.alpha_control.to_raw()])?;
    }
    if !mat.tex_gens.is_empty() {
        let (info, post): (Vec<u32>, Vec<u32>) = mat.tex_gens.iter().map(TexCoordGen::to_raw).unzip();
        dl.load_xf(xf::TEXMTXINFO, &info)?;
        dl.load_xf(xf::POSTMTXINFO, &post)?;
    }
    dl.pad(32);
    Ok(dl.into_bytes())
}

pub(crate) fn material_label(index: usize) -> String {
    format!("mat:{index}")
}

/// Emit material `index` under its label.
pub(crate) fn write_material(section: &mut Section, mat: &Material, index: usize) -> Result<()> {
    let gx = &mat.gx;
    let counts = [
        gx.tex_gens.len(),
        gx.channels.len(),
        gx.tev_stages.len(),
        gx.indirect_stages.len(),
    ];
    if counts[0] > MAX_TEX_GENS
        || counts[1] > MAX_CHANNELS
        || counts[2] > MAX_TEV_STAGES
        || counts[3] > MAX_INDIRECT_STAGES
    {
        return Err(invalid(&mat.name, format!("stage counts {counts:?} exceed hardware limits")));
    }
    let dl = encode_gx_material(gx).map_err(|e| invalid(&mat.name, e.to_string()))?;

    section.align(4);
    let start = section.pos();
    section.label(material_label(index));
    section.write_u32(0); // size, patched below
    section.write_model_offset(start);
    section.write_name(start, &mat.name);
    section.write_u32(mat.id);
    section.write_u32(if mat.xlu { 0x8000_0000 } else { 0 });
    for c in counts {
        section.write_u8(c as u8);
    }
    section.write_u32(mat.cull_mode.to_u32());
    section.write_u8(u8::from(mat.early_z));
    section.write_i8(mat.light_set);
    section.write_i8(mat.fog);
    section.write_u8(0);
    section.write_u32(mat.samplers.len() as u32);
    let samplers_at = MATERIAL_HEADER_SIZE;
    section.write_i32(if mat.samplers.is_empty() { 0 } else { samplers_at as i32 });
    section.write_u32(dl.len() as u32);
    let dl_offset_at = section.pos();
    section.write_i32(0);

    for (texmap, sampler) in mat.samplers.iter().enumerate() {
        let base = section.pos();
        section.write_name(base, &sampler.texture);
        section.write_name(base, &sampler.palette);
        section.write_u32(texmap as u32);
        section.write_u32(sampler.wrap_u.to_u32());
        section.write_u32(sampler.wrap_v.to_u32());
        section.write_u32(sampler.min_filter.to_u32());
        section.write_u32(sampler.mag_filter.to_u32());
        section.write_f32(sampler.lod_bias);
        section.write_u32(sampler.max_anisotropy.to_u32());
    }

    section.align(32);
    let dl_start = section.pos();
    section.patch_i32(dl_offset_at, (dl_start - start) as i32);
    section.write_bytes(&dl);
    let size = section.pos() - start;
    section.patch_u32(start, size as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::gx::{
        BlendModeFactor, BlendModeType, ColorS10, Compare, IndTexScale, KonstColorSel,
        RasColorChannel, TevColorArg, TevOp, TexGenSrc,
    };

    fn sample_gx() -> GxMaterial {
        let mut gx = GxMaterial::default();
        gx.alpha_compare.comp_left = Compare::GEqual;
        gx.alpha_compare.ref_left = 128;
        gx.z_mode.update = false;
        gx.blend_mode = BlendMode {
            ty: BlendModeType::Blend,
            source: BlendModeFactor::SrcAlpha,
            dest: BlendModeFactor::InvSrcAlpha,
            ..BlendMode::default()
        };
        gx.dst_alpha = DstAlpha {
            enabled: true,
            alpha: 77,
        };
        gx.tev_colors[1] = ColorS10 {
            r: -100,
            g: 1023,
            b: 0,
            a: 255,
        };
        gx.konst_colors[1] = Color::new(1, 2, 3, 4);
        gx.swap_table[2] = SwapTableEntry { r: 3, g: 2, b: 1, a: 0 };

        let mut second = gx.tev_stages[0];
        second.order.tex_enabled = true;
        second.order.tex_map = 1;
        second.order.ras_channel = RasColorChannel::Zero;
        second.color.a = TevColorArg::CPrev;
        second.color.b = TevColorArg::TexC;
        second.color.c = TevColorArg::RasC;
        second.color.formula = TevOp::Subtract;
        second.konst_color = KonstColorSel(0x0D);
        second.tex_swap = 2;
        gx.tev_stages.push(second);

        gx.tex_gens.push(TexCoordGen {
            source: TexGenSrc::Tex0,
            post_matrix: 61,
            normalize: true,
            ..TexCoordGen::default()
        });
        gx.indirect_stages.push(IndirectStage {
            tex_map: 2,
            tex_coord: 1,
            scale_s: IndTexScale::Div4,
            scale_t: IndTexScale::Div8,
        });
        gx
    }

    fn replay(dl: &[u8]) -> RegisterStateHandler {
        let mut state = RegisterStateHandler::default();
        let mut cursor = Cursor::new(dl);
        run_display_list(&mut cursor, &mut state, dl.len() as u32).unwrap();
        state
    }

    #[test]
    fn test_gx_material_round_trip() {
        let gx = sample_gx();
        let dl = encode_gx_material(&gx).unwrap();
        assert_eq!(dl.len() % 32, 0);
        let state = replay(&dl);
        let decoded = decode_gx_material(&state, 1, 1, 2, 1).unwrap();
        assert_eq!(decoded, gx);
    }

    #[test]
    fn test_cmode0_write_is_masked() {
        let gx = sample_gx();
        let state = replay(&encode_gx_material(&gx).unwrap());
        assert_eq!(state.bp_reg(bp::CMODE0) & !CMODE0_MASK, 0);
    }

    #[test]
    fn test_record_round_trip() {
        let mut mat = Material::new("lambert1");
        mat.id = 4;
        mat.xlu = true;
        mat.cull_mode = CullMode::None;
        mat.light_set = 0;
        mat.gx = sample_gx();
        let mut sampler = Sampler::new("tex_body");
        sampler.wrap_u = TextureWrap::Mirror;
        sampler.lod_bias = -0.5;
        mat.samplers.push(sampler);
        mat.samplers.push(Sampler::new("tex_eye"));

        let mut section = Section::new();
        write_material(&mut section, &mat, 0).unwrap();
        let data = section.finish().unwrap();
        let decoded = read_material(&data, 0).unwrap();
        assert_eq!(decoded, mat);
    }

    #[test]
    fn test_huge_sampler_count() {
        let mut rec = vec![0u8; 0x40];
        rec[0x20..0x24].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            read_material(&rec, 0),
            Err(Error::InvalidMaterial { .. })
        ));
    }

    #[test]
    fn test_stage_limit() {
        let mut mat = Material::new("too_many");
        mat.gx.tev_stages = vec![TevStage::default(); MAX_TEV_STAGES + 1];
        let mut section = Section::new();
        assert!(matches!(
            write_material(&mut section, &mat, 0),
            Err(Error::InvalidMaterial { .. })
        ));
    }
}
