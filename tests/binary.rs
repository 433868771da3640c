use shader_lower::spv::{self, read, shape, write, Inst, Op};
use shader_lower::{BuildConfig, Module};

fn encode(inst: &Inst) -> Vec<u32> {
    let mut out = vec![];
    write::encode_inst(inst, &mut out).unwrap();
    out
}

fn decode(words: &[u32]) -> Inst {
    let mut cursor = 0;
    let inst = read::decode_inst(words, &mut cursor).unwrap();
    assert_eq!(cursor, words.len());
    inst
}

/// An instruction with every field its shape allows filled in.
fn sample(opcode: Op, shape: shape::InstShape) -> Inst {
    let mut inst = Inst::from(opcode);
    if shape.has_result_type_id {
        inst = inst.with_result_type(7);
    }
    if shape.has_result_id {
        inst = inst.with_result(8);
    }
    if shape.has_name {
        inst = inst.with_name("main");
    }
    match shape.tail {
        shape::Tail::None => {}
        shape::Tail::Operands => inst = inst.with_operands([1, 2, 3, 4, 5]),
        shape::Tail::Labels => inst = inst.with_labels([(-1, 10), (3, 11)]),
    }
    inst
}

#[test]
fn every_shape_survives_encoding() {
    for &(opcode, shape) in shape::SHAPES {
        let inst = sample(opcode, shape);
        let words = encode(&inst);
        assert_eq!(words.len(), inst.word_count(), "Op{opcode:?}");
        assert_eq!(words[0] & 0xffff, opcode as u32);
        assert_eq!((words[0] >> 16) as usize, words.len());
        assert_eq!(decode(&words), inst, "Op{opcode:?}");
    }
}

#[test]
fn name_packing_in_context() {
    let inst = Inst::from(Op::Name).with_result(3).with_name("color");
    let words = encode(&inst);
    assert_eq!(
        words,
        [
            (4 << 16) | Op::Name as u32,
            3,
            u32::from_le_bytes(*b"colo"),
            u32::from_le_bytes(*b"r\0\0\0"),
        ]
    );
}

#[test]
fn encoding_checks_the_shape() {
    let mut out = vec![];
    // `OpStore` has no result.
    assert!(write::encode_inst(&Inst::from(Op::Store).with_result(1), &mut out).is_err());
    // `OpLoad` needs a result type.
    assert!(write::encode_inst(&Inst::from(Op::Load).with_result(1), &mut out).is_err());
    // `OpReturn` takes no operands.
    assert!(write::encode_inst(&Inst::from(Op::Return).with_operands([1]), &mut out).is_err());

    let huge = Inst::from(Op::CompositeConstruct)
        .with_result_type(1)
        .with_result(2)
        .with_operands(0..0x1_0000);
    let err = write::encode_inst(&huge, &mut out).unwrap_err();
    assert!(err.to_string().contains("16 bits"), "{err}");

    assert!(out.is_empty());
}

#[test]
fn decoding_rejects_malformed_instructions() {
    let decode_err = |words: &[u32]| read::decode_inst(words, &mut 0).unwrap_err().to_string();

    // Unknown opcode.
    assert!(decode_err(&[(1 << 16) | 0xfff0]).contains("unsupported opcode"));
    // Word count of 0.
    assert!(decode_err(&[Op::Return as u32]).contains("word count of 0"));
    // Truncated.
    assert!(decode_err(&[(3 << 16) | Op::Store as u32, 1]).contains("truncated"));
    // `OpReturn` with a trailing word.
    assert!(decode_err(&[(2 << 16) | Op::Return as u32, 0]).contains("overlong"));
    // Name with no NUL terminator.
    let unterminated = [(2 << 16) | Op::Extension as u32, u32::from_le_bytes(*b"abcd")];
    assert!(decode_err(&unterminated).contains("terminator"));
}

#[test]
fn parser_swaps_endianness() {
    let words = Module::new(BuildConfig { version: (1, 2), ..BuildConfig::default() })
        .serialize()
        .unwrap();

    let native: Vec<Inst> =
        read::ModuleParser::read_from_spv_words(words.clone()).unwrap().collect::<Result<_, _>>().unwrap();

    let swapped_words = words.iter().map(|w| w.swap_bytes()).collect();
    let parser = read::ModuleParser::read_from_spv_words(swapped_words).unwrap();
    assert_eq!(parser.version(), (1, 2));
    assert_eq!(parser.header[0], spirv::MAGIC_NUMBER);
    let swapped: Vec<Inst> = parser.collect::<Result<_, _>>().unwrap();

    assert_eq!(native, swapped);
}

#[test]
fn parser_reads_bytes() {
    let words = Module::new(BuildConfig::default()).serialize().unwrap();
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();

    let parser = read::ModuleParser::read_from_spv_bytes(bytes.clone()).unwrap();
    assert_eq!(parser.header[..], words[..spv::HEADER_LEN]);
    assert!(read::ModuleParser::read_from_spv_bytes(bytes[1..].to_vec()).is_err());
}

#[test]
fn parser_stops_after_an_error() {
    let mut words = Module::new(BuildConfig::default()).serialize().unwrap();
    words.push((1 << 16) | 0xfff0);
    words.push((1 << 16) | Op::Nop as u32);

    let results: Vec<_> = read::ModuleParser::read_from_spv_words(words).unwrap().collect();
    assert!(results.last().unwrap().is_err());
    assert!(results[..results.len() - 1].iter().all(|r| r.is_ok()));
}
