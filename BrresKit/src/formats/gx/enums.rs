//! GX fixed-function enumerations.
//!
//! Values match the hardware encodings used in BP/XF/CP registers.

hw_enum! {
    /// Depth/alpha comparison function.
    #[derive(Default)]
    pub enum Compare {
        Never = 0,
        Less = 1,
        Equal = 2,
        LEqual = 3,
        Greater = 4,
        NEqual = 5,
        GEqual = 6,
        #[default]
        Always = 7,
    }
}

hw_enum! {
    /// Combines the two alpha comparisons.
    #[derive(Default)]
    pub enum AlphaOp {
        #[default]
        And = 0,
        Or = 1,
        Xor = 2,
        Xnor = 3,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum BlendModeType {
        #[default]
        None = 0,
        Blend = 1,
        Logic = 2,
        Subtract = 3,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum BlendModeFactor {
        Zero = 0,
        One = 1,
        SrcColor = 2,
        InvSrcColor = 3,
        #[default]
        SrcAlpha = 4,
        InvSrcAlpha = 5,
        DstAlpha = 6,
        InvDstAlpha = 7,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum LogicOp {
        Clear = 0,
        And = 1,
        RevAnd = 2,
        #[default]
        Copy = 3,
        InvAnd = 4,
        NoOp = 5,
        Xor = 6,
        Or = 7,
        Nor = 8,
        Equiv = 9,
        Inv = 10,
        RevOr = 11,
        InvCopy = 12,
        InvOr = 13,
        Nand = 14,
        Set = 15,
    }
}

hw_enum! {
    /// TEV color combiner input.
    #[derive(Default)]
    pub enum TevColorArg {
        CPrev = 0,
        APrev = 1,
        C0 = 2,
        A0 = 3,
        C1 = 4,
        A1 = 5,
        C2 = 6,
        A2 = 7,
        TexC = 8,
        TexA = 9,
        RasC = 10,
        RasA = 11,
        One = 12,
        Half = 13,
        Konst = 14,
        #[default]
        Zero = 15,
    }
}

hw_enum! {
    /// TEV alpha combiner input.
    #[derive(Default)]
    pub enum TevAlphaArg {
        APrev = 0,
        A0 = 1,
        A1 = 2,
        A2 = 3,
        TexA = 4,
        RasA = 5,
        Konst = 6,
        #[default]
        Zero = 7,
    }
}

hw_enum! {
    /// Bias applied to the combiner result. The hardware value 3 selects
    /// comparison mode and is folded into [`TevOp`].
    #[derive(Default)]
    pub enum TevBias {
        #[default]
        Zero = 0,
        AddHalf = 1,
        SubHalf = 2,
    }
}

hw_enum! {
    /// Combiner formula. Comparison ops are `8 + (scale << 1 | op)`; for the
    /// alpha combiner the last pair compares A8 instead of RGB8.
    #[derive(Default)]
    pub enum TevOp {
        #[default]
        Add = 0,
        Subtract = 1,
        CompR8Gt = 8,
        CompR8Eq = 9,
        CompGr16Gt = 10,
        CompGr16Eq = 11,
        CompBgr24Gt = 12,
        CompBgr24Eq = 13,
        CompRgb8Gt = 14,
        CompRgb8Eq = 15,
    }
}

impl TevOp {
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        self.to_u32() >= 8
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum TevScale {
        #[default]
        Scale1 = 0,
        Scale2 = 1,
        Scale4 = 2,
        Divide2 = 3,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum TevReg {
        #[default]
        Prev = 0,
        Reg0 = 1,
        Reg1 = 2,
        Reg2 = 3,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum IndTexFormat {
        #[default]
        F8 = 0,
        F5 = 1,
        F4 = 2,
        F3 = 3,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum IndTexBiasSel {
        #[default]
        None = 0,
        S = 1,
        T = 2,
        St = 3,
        U = 4,
        Su = 5,
        Tu = 6,
        Stu = 7,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum IndTexAlphaSel {
        #[default]
        Off = 0,
        S = 1,
        T = 2,
        U = 3,
    }
}

hw_enum! {
    /// Indirect matrix selection. Values 4, 8 and 12-15 are invalid.
    #[derive(Default)]
    pub enum IndTexMtxId {
        #[default]
        Off = 0,
        Matrix0 = 1,
        Matrix1 = 2,
        Matrix2 = 3,
        S0 = 5,
        S1 = 6,
        S2 = 7,
        T0 = 9,
        T1 = 10,
        T2 = 11,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum IndTexWrap {
        #[default]
        Off = 0,
        Wrap256 = 1,
        Wrap128 = 2,
        Wrap64 = 3,
        Wrap32 = 4,
        Wrap16 = 5,
        Wrap0 = 6,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum IndTexScale {
        #[default]
        Div1 = 0,
        Div2 = 1,
        Div4 = 2,
        Div8 = 3,
        Div16 = 4,
        Div32 = 5,
        Div64 = 6,
        Div128 = 7,
        Div256 = 8,
    }
}

hw_enum! {
    /// Rasterized color channel feeding a TEV stage.
    #[derive(Default)]
    pub enum RasColorChannel {
        Color0A0 = 0,
        Color1A1 = 1,
        AlphaBump = 5,
        AlphaBumpN = 6,
        #[default]
        Zero = 7,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum TexGenType {
        #[default]
        Regular = 0,
        EmbossMap = 1,
        Color0 = 2,
        Color1 = 3,
    }
}

hw_enum! {
    /// Texture generator source row.
    #[derive(Default)]
    pub enum TexGenSrc {
        Position = 0,
        Normal = 1,
        Colors = 2,
        BinormalT = 3,
        BinormalB = 4,
        #[default]
        Tex0 = 5,
        Tex1 = 6,
        Tex2 = 7,
        Tex3 = 8,
        Tex4 = 9,
        Tex5 = 10,
        Tex6 = 11,
        Tex7 = 12,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum TexInputForm {
        #[default]
        Ab11 = 0,
        Abc1 = 1,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum ColorSource {
        #[default]
        Register = 0,
        Vertex = 1,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum DiffuseFunction {
        #[default]
        None = 0,
        Sign = 1,
        Clamp = 2,
    }
}

hw_enum! {
    /// Element format of generic (non-color) vertex components.
    #[derive(Default)]
    pub enum ComponentType {
        U8 = 0,
        S8 = 1,
        U16 = 2,
        S16 = 3,
        #[default]
        F32 = 4,
    }
}

impl ComponentType {
    /// Size of one component in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            ComponentType::U8 | ComponentType::S8 => 1,
            ComponentType::U16 | ComponentType::S16 => 2,
            ComponentType::F32 => 4,
        }
    }
}

hw_enum! {
    /// Vertex color formats.
    #[derive(Default)]
    pub enum ColorFormat {
        Rgb565 = 0,
        Rgb8 = 1,
        Rgbx8 = 2,
        Rgba4 = 3,
        Rgba6 = 4,
        #[default]
        Rgba8 = 5,
    }
}

impl ColorFormat {
    /// Size of one color in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            ColorFormat::Rgb565 | ColorFormat::Rgba4 => 2,
            ColorFormat::Rgb8 | ColorFormat::Rgba6 => 3,
            ColorFormat::Rgbx8 | ColorFormat::Rgba8 => 4,
        }
    }
}

hw_enum! {
    /// Draw command topology. The value is the opcode with the VAT bits clear.
    pub enum PrimitiveType {
        Quads = 0x80,
        Quads2 = 0x88,
        Triangles = 0x90,
        TriangleStrip = 0x98,
        TriangleFan = 0xA0,
        Lines = 0xA8,
        LineStrip = 0xB0,
        Points = 0xB8,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum CullMode {
        None = 0,
        Front = 1,
        #[default]
        Back = 2,
        All = 3,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum TextureWrap {
        Clamp = 0,
        #[default]
        Repeat = 1,
        Mirror = 2,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum TextureFilter {
        Near = 0,
        #[default]
        Linear = 1,
        NearMipNear = 2,
        LinMipNear = 3,
        NearMipLin = 4,
        LinMipLin = 5,
    }
}

hw_enum! {
    #[derive(Default)]
    pub enum AnisotropyLevel {
        #[default]
        X1 = 0,
        X2 = 1,
        X4 = 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_enums_reject_holes() {
        assert_eq!(IndTexMtxId::from_u32(5), Some(IndTexMtxId::S0));
        assert_eq!(IndTexMtxId::from_u32(4), None);
        assert_eq!(IndTexMtxId::from_u32(12), None);
        assert_eq!(RasColorChannel::from_u32(2), None);
        assert_eq!(TevOp::from_u32(8), Some(TevOp::CompR8Gt));
        assert_eq!(TevOp::from_u32(2), None);
    }

    #[test]
    fn test_primitive_type_from_opcode() {
        assert_eq!(PrimitiveType::from_u32(0x98), Some(PrimitiveType::TriangleStrip));
        assert_eq!(PrimitiveType::from_u32(0x9A & 0xF8), Some(PrimitiveType::TriangleStrip));
        assert_eq!(PrimitiveType::from_u32(0x40), None);
    }
}
