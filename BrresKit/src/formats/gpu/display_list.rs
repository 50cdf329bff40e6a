//! GPU display list interpreter and writer.
//!
//! A display list is a stream of one-byte opcodes followed by their payloads.
//! [`run_display_list`] replays a list into a [`DisplayListHandler`]; the
//! handler decides which commands carry meaning for it.

use std::collections::BTreeMap;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use super::registers::{bp, cp, tev_register_is_konst};
use crate::error::{Error, Result};
use crate::formats::gx::enums::PrimitiveType;

/// Command opcodes.
pub mod opcode {
    pub const NOP: u8 = 0x00;
    pub const LOAD_CP_REG: u8 = 0x08;
    pub const LOAD_XF_REG: u8 = 0x10;
    pub const LOAD_INDX_A: u8 = 0x20;
    pub const LOAD_INDX_B: u8 = 0x28;
    pub const LOAD_INDX_C: u8 = 0x30;
    pub const LOAD_INDX_D: u8 = 0x38;
    pub const CALL_DL: u8 = 0x40;
    pub const INVL_VC: u8 = 0x48;
    pub const LOAD_BP_REG: u8 = 0x61;
    pub const DRAW_FIRST: u8 = 0x80;
    pub const DRAW_LAST: u8 = 0xBF;
}

/// Target of an indexed XF load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedLoad {
    /// Position matrix memory.
    A,
    /// Normal matrix memory.
    B,
    /// Texture matrix memory.
    C,
    /// Light memory.
    D,
}

impl IndexedLoad {
    const fn opcode(self) -> u8 {
        match self {
            IndexedLoad::A => opcode::LOAD_INDX_A,
            IndexedLoad::B => opcode::LOAD_INDX_B,
            IndexedLoad::C => opcode::LOAD_INDX_C,
            IndexedLoad::D => opcode::LOAD_INDX_D,
        }
    }
}

/// Receives decoded display list commands. Every hook defaults to a no-op
/// except [`on_draw`](Self::on_draw), whose payload size depends on state
/// only a vertex consumer knows.
pub trait DisplayListHandler {
    fn on_cp(&mut self, _address: u8, _value: u32) -> Result<()> {
        Ok(())
    }

    fn on_xf(&mut self, _address: u16, _values: &[u32]) -> Result<()> {
        Ok(())
    }

    fn on_bp(&mut self, _address: u8, _value: u32) -> Result<()> {
        Ok(())
    }

    fn on_indexed_load(
        &mut self,
        _target: IndexedLoad,
        _index: u16,
        _address: u16,
        _size: u8,
    ) -> Result<()> {
        Ok(())
    }

    /// Consume `count` vertices of a draw from `reader`.
    fn on_draw(
        &mut self,
        _reader: &mut Cursor<&[u8]>,
        ty: PrimitiveType,
        _vat: u8,
        count: u16,
    ) -> Result<()> {
        Err(Error::DisplayList {
            message: format!("unexpected {ty:?} draw of {count} vertices"),
        })
    }
}

/// Replay `buf_size` bytes of display list starting at the reader position.
///
/// Unknown opcodes and `CALL_DL` terminate the list.
pub fn run_display_list<H: DisplayListHandler + ?Sized>(
    reader: &mut Cursor<&[u8]>,
    handler: &mut H,
    buf_size: u32,
) -> Result<()> {
    let start = reader.position();
    let end = start + u64::from(buf_size);
    if end > reader.get_ref().len() as u64 {
        return Err(Error::OffsetOutOfRange {
            offset: end as i64,
            len: reader.get_ref().len(),
        });
    }

    while reader.position() < end {
        let cmd = reader.read_u8()?;
        match cmd {
            opcode::NOP | opcode::INVL_VC => {}
            opcode::LOAD_CP_REG => {
                let address = reader.read_u8()?;
                let value = reader.read_u32::<BigEndian>()?;
                handler.on_cp(address, value)?;
            }
            opcode::LOAD_XF_REG => {
                let count = u32::from(reader.read_u16::<BigEndian>()?) + 1;
                let address = reader.read_u16::<BigEndian>()?;
                let values = (0..count)
                    .map(|_| reader.read_u32::<BigEndian>())
                    .collect::<std::io::Result<Vec<_>>>()?;
                handler.on_xf(address, &values)?;
            }
            opcode::LOAD_INDX_A | opcode::LOAD_INDX_B | opcode::LOAD_INDX_C | opcode::LOAD_INDX_D => {
                let target = match cmd {
                    opcode::LOAD_INDX_A => IndexedLoad::A,
                    opcode::LOAD_INDX_B => IndexedLoad::B,
                    opcode::LOAD_INDX_C => IndexedLoad::C,
                    _ => IndexedLoad::D,
                };
                let index = reader.read_u16::<BigEndian>()?;
                let packed = reader.read_u16::<BigEndian>()?;
                let size = ((packed >> 12) + 1) as u8;
                handler.on_indexed_load(target, index, packed & 0xFFF, size)?;
            }
            opcode::CALL_DL => {
                tracing::warn!("CALL_DL is not supported; ending display list");
                break;
            }
            opcode::LOAD_BP_REG => {
                let raw = reader.read_u32::<BigEndian>()?;
                handler.on_bp((raw >> 24) as u8, raw & 0x00FF_FFFF)?;
            }
            opcode::DRAW_FIRST..=opcode::DRAW_LAST => {
                let ty = PrimitiveType::from_u32(u32::from(cmd & 0xF8)).ok_or_else(|| {
                    Error::DisplayList {
                        message: format!("invalid draw opcode {cmd:#04x}"),
                    }
                })?;
                let count = reader.read_u16::<BigEndian>()?;
                handler.on_draw(reader, ty, cmd & 7, count)?;
            }
            _ => {
                tracing::debug!("Unknown display list opcode {:#04x}; ending list", cmd);
                break;
            }
        }
    }
    Ok(())
}

/// Captures CP and XF writes of a vertex setup list.
#[derive(Debug, Clone, Default)]
pub struct VertexSetupHandler {
    pub cp: BTreeMap<u8, u32>,
    pub xf: BTreeMap<u16, u32>,
}

impl VertexSetupHandler {
    /// Raw `VCD_LO`/`VCD_HI`.
    #[must_use]
    pub fn vcd(&self) -> (u32, u32) {
        (self.cp_reg(cp::VCD_LO), self.cp_reg(cp::VCD_HI))
    }

    /// Raw `VAT_A`/`VAT_B`/`VAT_C` of a vertex format slot.
    #[must_use]
    pub fn vat(&self, slot: u8) -> (u32, u32, u32) {
        (
            self.cp_reg(cp::VAT_A + slot),
            self.cp_reg(cp::VAT_B + slot),
            self.cp_reg(cp::VAT_C + slot),
        )
    }

    fn cp_reg(&self, address: u8) -> u32 {
        self.cp.get(&address).copied().unwrap_or(0)
    }
}

impl DisplayListHandler for VertexSetupHandler {
    fn on_cp(&mut self, address: u8, value: u32) -> Result<()> {
        self.cp.insert(address, value);
        Ok(())
    }

    fn on_xf(&mut self, address: u16, values: &[u32]) -> Result<()> {
        for (addr, v) in (address..).zip(values) {
            self.xf.insert(addr, *v);
        }
        Ok(())
    }
}

const BP_FULL_MASK: u32 = 0x00FF_FFFF;

/// Accumulates BP and XF state written by a material display list.
///
/// Honors the one-shot BP write mask and routes TEV register writes to
/// color or konst storage by their type bit.
#[derive(Debug, Clone)]
pub struct RegisterStateHandler {
    pub bp: BTreeMap<u8, u32>,
    pub xf: BTreeMap<u16, u32>,
    /// (low, high) of `TEV_REGISTER` 0-3 written as color registers.
    pub tev_colors: [(u32, u32); 4],
    /// (low, high) of `TEV_REGISTER` 0-3 written as konst registers.
    pub konst_colors: [(u32, u32); 4],
    mask: u32,
}

impl Default for RegisterStateHandler {
    fn default() -> Self {
        Self {
            bp: BTreeMap::new(),
            xf: BTreeMap::new(),
            tev_colors: [(0, 0); 4],
            konst_colors: [(0, 0); 4],
            mask: BP_FULL_MASK,
        }
    }
}

impl RegisterStateHandler {
    #[must_use]
    pub fn bp_reg(&self, address: u8) -> u32 {
        self.bp.get(&address).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn xf_reg(&self, address: u16) -> u32 {
        self.xf.get(&address).copied().unwrap_or(0)
    }
}

impl DisplayListHandler for RegisterStateHandler {
    fn on_bp(&mut self, address: u8, value: u32) -> Result<()> {
        if address == bp::BP_MASK {
            self.mask = value & BP_FULL_MASK;
            return Ok(());
        }
        let mask = std::mem::replace(&mut self.mask, BP_FULL_MASK);
        let merge = |old: u32| (old & !mask) | (value & mask);

        if (bp::TEV_REGISTERL..=bp::TEV_REGISTERL + 7).contains(&address) {
            let index = usize::from((address - bp::TEV_REGISTERL) / 2);
            let low = (address - bp::TEV_REGISTERL) % 2 == 0;
            let bank = if tev_register_is_konst(value) {
                &mut self.konst_colors[index]
            } else {
                &mut self.tev_colors[index]
            };
            if low {
                bank.0 = merge(bank.0);
            } else {
                bank.1 = merge(bank.1);
            }
            return Ok(());
        }

        let old = self.bp_reg(address);
        self.bp.insert(address, merge(old));
        Ok(())
    }

    fn on_xf(&mut self, address: u16, values: &[u32]) -> Result<()> {
        for (addr, v) in (address..).zip(values) {
            self.xf.insert(addr, *v);
        }
        Ok(())
    }
}

/// Builds a big-endian display list.
#[derive(Debug, Clone, Default)]
pub struct DisplayListWriter {
    data: Vec<u8>,
}

impl DisplayListWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn load_bp(&mut self, address: u8, value: u32) {
        self.write_u8(opcode::LOAD_BP_REG);
        self.write_u32(u32::from(address) << 24 | (value & BP_FULL_MASK));
    }

    /// Restrict the next BP write to the bits set in `mask`.
    pub fn bp_mask(&mut self, mask: u32) {
        self.load_bp(bp::BP_MASK, mask);
    }

    pub fn load_cp(&mut self, address: u8, value: u32) {
        self.write_u8(opcode::LOAD_CP_REG);
        self.write_u8(address);
        self.write_u32(value);
    }

    /// Load consecutive XF registers starting at `address`.
    pub fn load_xf(&mut self, address: u16, values: &[u32]) -> Result<()> {
        let count = u16::try_from(values.len())
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(|| Error::DisplayList {
                message: format!("XF load of {} values", values.len()),
            })?;
        self.write_u8(opcode::LOAD_XF_REG);
        self.write_u16(count);
        self.write_u16(address);
        for v in values {
            self.write_u32(*v);
        }
        Ok(())
    }

    pub fn load_indexed(&mut self, target: IndexedLoad, index: u16, address: u16, size: u8) {
        self.write_u8(target.opcode());
        self.write_u16(index);
        self.write_u16((u16::from(size.saturating_sub(1)) << 12) | (address & 0xFFF));
    }

    /// Begin a draw; the caller writes `count` vertices afterwards.
    pub fn draw(&mut self, ty: PrimitiveType, vat: u8, count: u16) {
        self.write_u8(ty.to_u32() as u8 | (vat & 7));
        self.write_u16(count);
    }

    /// Pad with NOPs to a multiple of `alignment`.
    pub fn pad(&mut self, alignment: usize) {
        let padding = (alignment - (self.data.len() % alignment)) % alignment;
        self.data.extend(std::iter::repeat_n(opcode::NOP, padding));
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        cp: Vec<(u8, u32)>,
        xf: Vec<(u16, Vec<u32>)>,
        bp: Vec<(u8, u32)>,
        loads: Vec<(IndexedLoad, u16, u16, u8)>,
    }

    impl DisplayListHandler for Recorder {
        fn on_cp(&mut self, address: u8, value: u32) -> Result<()> {
            self.cp.push((address, value));
            Ok(())
        }
        fn on_xf(&mut self, address: u16, values: &[u32]) -> Result<()> {
            self.xf.push((address, values.to_vec()));
            Ok(())
        }
        fn on_bp(&mut self, address: u8, value: u32) -> Result<()> {
            self.bp.push((address, value));
            Ok(())
        }
        fn on_indexed_load(&mut self, t: IndexedLoad, i: u16, a: u16, s: u8) -> Result<()> {
            self.loads.push((t, i, a, s));
            Ok(())
        }
    }

    fn run(data: &[u8]) -> Recorder {
        let mut rec = Recorder::default();
        let mut cursor = Cursor::new(data);
        run_display_list(&mut cursor, &mut rec, data.len() as u32).unwrap();
        rec
    }

    #[test]
    fn test_command_decoding() {
        let mut dl = DisplayListWriter::new();
        dl.load_cp(cp::VCD_LO, 0x600);
        dl.load_xf(0x1008, &[0x11, 0x22]).unwrap();
        dl.load_bp(bp::ZMODE, 0x17);
        dl.load_indexed(IndexedLoad::A, 5, 12, 12);
        dl.pad(32);
        let data = dl.into_bytes();
        assert_eq!(data.len(), 32);

        let rec = run(&data);
        assert_eq!(rec.cp, vec![(cp::VCD_LO, 0x600)]);
        assert_eq!(rec.xf, vec![(0x1008, vec![0x11, 0x22])]);
        assert_eq!(rec.bp, vec![(bp::ZMODE, 0x17)]);
        assert_eq!(rec.loads, vec![(IndexedLoad::A, 5, 12, 12)]);
    }

    #[test]
    fn test_unknown_opcode_terminates() {
        let mut dl = DisplayListWriter::new();
        dl.load_bp(bp::ZMODE, 1);
        dl.write_u8(0xFF);
        dl.load_bp(bp::CMODE0, 2);
        let rec = run(&dl.into_bytes());
        assert_eq!(rec.bp.len(), 1);
    }

    #[test]
    fn test_call_dl_terminates() {
        let data = [opcode::CALL_DL, 0, 0, 0, 0, 0, 0, 0, 0, opcode::LOAD_BP_REG, 0x40, 0, 0, 1];
        let rec = run(&data);
        assert!(rec.bp.is_empty());
    }

    #[test]
    fn test_draw_without_consumer_fails() {
        let mut dl = DisplayListWriter::new();
        dl.draw(PrimitiveType::Triangles, 0, 3);
        let data = dl.into_bytes();
        let mut cursor = Cursor::new(data.as_slice());
        let mut rec = Recorder::default();
        assert!(run_display_list(&mut cursor, &mut rec, data.len() as u32).is_err());
    }

    #[test]
    fn test_buffer_size_out_of_range() {
        let data = [0u8; 4];
        let mut cursor = Cursor::new(&data[..]);
        let mut rec = Recorder::default();
        assert!(run_display_list(&mut cursor, &mut rec, 8).is_err());
    }

    #[test]
    fn test_bp_mask_is_one_shot() {
        let mut dl = DisplayListWriter::new();
        dl.load_bp(bp::CMODE0, 0xFFFF);
        dl.bp_mask(0x00FF);
        dl.load_bp(bp::CMODE0, 0x0000);
        dl.load_bp(bp::ZMODE, 0x1234);
        let data = dl.into_bytes();

        let mut state = RegisterStateHandler::default();
        let mut cursor = Cursor::new(data.as_slice());
        run_display_list(&mut cursor, &mut state, data.len() as u32).unwrap();
        assert_eq!(state.bp_reg(bp::CMODE0), 0xFF00);
        assert_eq!(state.bp_reg(bp::ZMODE), 0x1234);
    }

    #[test]
    fn test_tev_registers_routed_by_type() {
        let mut dl = DisplayListWriter::new();
        dl.load_bp(bp::TEV_REGISTERL + 2, 0x0000_0010);
        dl.load_bp(bp::TEV_REGISTERL + 2, 0x0080_0020);
        dl.load_bp(bp::TEV_REGISTERH + 6, 0x0080_0030);
        let data = dl.into_bytes();

        let mut state = RegisterStateHandler::default();
        let mut cursor = Cursor::new(data.as_slice());
        run_display_list(&mut cursor, &mut state, data.len() as u32).unwrap();
        assert_eq!(state.tev_colors[1].0, 0x10);
        assert_eq!(state.konst_colors[1].0, 0x0080_0020);
        assert_eq!(state.konst_colors[3].1, 0x0080_0030);
        assert!(state.bp.is_empty());
    }
}
