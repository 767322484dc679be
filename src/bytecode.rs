//! Opcode definitions for the supported bytecode subset.

/// Opcodes this interpreter executes. Anything outside this set stops
/// execution with an unknown-opcode fault.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpCode {
    IconstM1,
    Iconst0,
    Iconst1,
    Iconst2,
    Iconst3,
    Iconst4,
    Iconst5,
    BiPush,
    SiPush,
    Ldc,
    ILoad,
    ALoad,
    ILoad0,
    ILoad1,
    ILoad2,
    ILoad3,
    ALoad0,
    ALoad1,
    ALoad2,
    ALoad3,
    AALoad,
    IStore,
    AStore,
    IStore0,
    IStore1,
    IStore2,
    IStore3,
    AStore0,
    AStore1,
    AStore2,
    AStore3,
    AAStore,
    Pop,
    Dup,
    IAdd,
    IInc,
    IfICmpEq,
    IfICmpNe,
    IfICmpLt,
    IfICmpGe,
    IfICmpGt,
    IfICmpLe,
    Goto,
    IReturn,
    Return,
    GetStatic,
    PutStatic,
    GetField,
    PutField,
    InvokeVirtual,
    InvokeSpecial,
    InvokeDynamic,
    New,
    ANewArray,
    ArrayLength,
}

impl OpCode {
    /// Maps a raw bytecode byte to an opcode, or `None` for anything
    /// unsupported.
    pub fn decode(byte: u8) -> Option<Self> {
        let op = match byte {
            2 => Self::IconstM1,
            3 => Self::Iconst0,
            4 => Self::Iconst1,
            5 => Self::Iconst2,
            6 => Self::Iconst3,
            7 => Self::Iconst4,
            8 => Self::Iconst5,
            16 => Self::BiPush,
            17 => Self::SiPush,
            18 => Self::Ldc,
            21 => Self::ILoad,
            25 => Self::ALoad,
            26 => Self::ILoad0,
            27 => Self::ILoad1,
            28 => Self::ILoad2,
            29 => Self::ILoad3,
            42 => Self::ALoad0,
            43 => Self::ALoad1,
            44 => Self::ALoad2,
            45 => Self::ALoad3,
            50 => Self::AALoad,
            54 => Self::IStore,
            58 => Self::AStore,
            59 => Self::IStore0,
            60 => Self::IStore1,
            61 => Self::IStore2,
            62 => Self::IStore3,
            75 => Self::AStore0,
            76 => Self::AStore1,
            77 => Self::AStore2,
            78 => Self::AStore3,
            83 => Self::AAStore,
            87 => Self::Pop,
            89 => Self::Dup,
            96 => Self::IAdd,
            132 => Self::IInc,
            159 => Self::IfICmpEq,
            160 => Self::IfICmpNe,
            161 => Self::IfICmpLt,
            162 => Self::IfICmpGe,
            163 => Self::IfICmpGt,
            164 => Self::IfICmpLe,
            167 => Self::Goto,
            172 => Self::IReturn,
            177 => Self::Return,
            178 => Self::GetStatic,
            179 => Self::PutStatic,
            180 => Self::GetField,
            181 => Self::PutField,
            182 => Self::InvokeVirtual,
            183 => Self::InvokeSpecial,
            186 => Self::InvokeDynamic,
            187 => Self::New,
            189 => Self::ANewArray,
            190 => Self::ArrayLength,
            _ => return None,
        };
        Some(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_the_supported_set() {
        assert_eq!(OpCode::decode(2), Some(OpCode::IconstM1));
        assert_eq!(OpCode::decode(8), Some(OpCode::Iconst5));
        assert_eq!(OpCode::decode(96), Some(OpCode::IAdd));
        assert_eq!(OpCode::decode(167), Some(OpCode::Goto));
        assert_eq!(OpCode::decode(190), Some(OpCode::ArrayLength));
    }

    #[test]
    fn unsupported_bytes_decode_to_none() {
        assert_eq!(OpCode::decode(0), None); // nop
        assert_eq!(OpCode::decode(184), None); // invokestatic
        assert_eq!(OpCode::decode(255), None);
    }
}
