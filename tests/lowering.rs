use shader_lower::ast::{
    BinOp, Expr, ImageAccess, ImageConfig, Intrinsic, MemoryLayout, Scalar, StepOp, StructType,
    TextureAccess, Type, Var, VarFlags, Variable,
};
use shader_lower::lower::{linearize, Step};
use shader_lower::spv::{Id, Inst, Op};
use shader_lower::{Block, BuildConfig, ExprLowerer, FuncScope, LowerError, Module};

struct Fixture {
    module: Module,
    func: FuncScope,
    block: Block,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(BuildConfig::default())
    }

    fn with_config(config: BuildConfig) -> Self {
        let mut module = Module::new(config);
        let func = module.begin_function("main", &Type::Void, &[]);
        let block = module.new_block();
        Self { module, func, block }
    }

    fn lower(&mut self, expr: &Expr) -> Result<Id, LowerError> {
        ExprLowerer::new(&mut self.module, &mut self.func, &mut self.block).lower(expr)
    }

    fn lower_no_load(&mut self, expr: &Expr) -> Result<Id, LowerError> {
        ExprLowerer::new(&mut self.module, &mut self.func, &mut self.block).lower_no_load(expr)
    }

    fn opcodes(&self) -> Vec<Op> {
        self.block.instructions.iter().map(|inst| inst.opcode).collect()
    }

    fn last(&self, opcode: Op) -> Inst {
        self.block.instructions.iter().rev().find(|inst| inst.opcode == opcode).unwrap().clone()
    }

    fn id_of(&self, name: &str) -> Id {
        self.module.lookup(Some(&self.func), name).unwrap().info.id
    }
}

fn local(name: &str, ty: Type) -> Var {
    Variable::new(name, ty, VarFlags::LOCAL)
}

fn nested_struct() -> Type {
    let inner =
        Type::structure(StructType::new("Inner", MemoryLayout::Std430, [("c".into(), Type::float())]));
    Type::structure(StructType::new("Outer", MemoryLayout::Std430, [("b".into(), inner)]))
}

#[test]
fn member_and_index_sum() {
    // float x = a.y + b[2];
    let mut f = Fixture::new();
    let a = local("a", Type::vec(Scalar::Float, 4));
    let b = local("b", Type::array(Type::float(), Some(4)));
    let x = local("x", Type::float());

    let sum = Expr::binary(
        Type::float(),
        BinOp::Add,
        Expr::swizzle(Expr::ident(&a), "y").unwrap(),
        Expr::index(Expr::ident(&b), Expr::literal(2)).unwrap(),
    );
    f.lower(&Expr::init(&x, sum)).unwrap();

    assert_eq!(
        f.opcodes(),
        [Op::AccessChain, Op::Load, Op::AccessChain, Op::Load, Op::FAdd, Op::Store]
    );
    let chains: Vec<&Inst> =
        f.block.instructions.iter().filter(|inst| inst.opcode == Op::AccessChain).collect();
    assert_eq!(chains[0].operands[0], f.id_of("a"));
    assert_eq!(chains[1].operands[0], f.id_of("b"));
    assert_eq!(f.last(Op::Store).operands[0], f.id_of("x"));

    // All three variables are declared once, in `Function` storage.
    assert_eq!(f.func.function.variables.len(), 3);
}

#[test]
fn member_and_index_sum_across_storage_classes() {
    // float x = a.y + b[2];
    let mut f = Fixture::new();
    let a = Variable::new("a", Type::vec(Scalar::Float, 4), VarFlags::SHADER_INPUT);
    let b = Variable::new("b", Type::array(Type::float(), None), VarFlags::UNIFORM);
    let x = local("x", Type::float());

    let sum = Expr::binary(
        Type::float(),
        BinOp::Add,
        Expr::swizzle(Expr::ident(&a), "y").unwrap(),
        Expr::index(Expr::ident(&b), Expr::literal(2)).unwrap(),
    );
    let value = f.lower(&Expr::init(&x, sum)).unwrap();

    assert_eq!(
        f.opcodes(),
        [Op::AccessChain, Op::Load, Op::AccessChain, Op::Load, Op::FAdd, Op::Store]
    );
    let chains: Vec<Inst> = f
        .block
        .instructions
        .iter()
        .filter(|inst| inst.opcode == Op::AccessChain)
        .cloned()
        .collect();
    assert_eq!(chains[0].operands[..], [f.id_of("a"), f.module.register_literal(1u32)]);
    assert_eq!(chains[1].operands[..], [f.id_of("b"), f.module.register_literal(2)]);
    let store = f.last(Op::Store);
    assert_eq!(store.operands[..], [f.id_of("x"), value]);
    assert_eq!(f.last(Op::FAdd).result_id, Some(value));

    let decl = |f: &Fixture, id: Id| {
        f.module.declarations.iter().find(|inst| inst.result_id == Some(id)).unwrap().clone()
    };
    let storage_of = |f: &Fixture, pointer: &Inst| {
        decl(f, pointer.result_type_id.unwrap()).operands[0]
    };
    assert_eq!(storage_of(&f, &chains[0]), spirv::StorageClass::Input as u32);
    assert_eq!(storage_of(&f, &chains[1]), spirv::StorageClass::Uniform as u32);

    // `b` is laid out as `std140`.
    let b_var = decl(&f, f.id_of("b"));
    assert_eq!(b_var.operands[..], [spirv::StorageClass::Uniform as u32]);
    let b_array = decl(&f, b_var.result_type_id.unwrap()).operands[1];
    assert_eq!(decl(&f, b_array).opcode, Op::TypeRuntimeArray);
    assert!(f.module.decorations.iter().any(|inst| inst.operands[..]
        == [b_array, spirv::Decoration::ArrayStride as u32, 16]));
}

#[test]
fn assignments_result_in_the_stored_value() {
    let mut f = Fixture::new();
    let x = local("x", Type::float());
    let one = f.lower(&Expr::assign(Expr::ident(&x), Expr::literal(1.0f32))).unwrap();
    assert_eq!(f.opcodes(), [Op::Store]);
    assert_eq!(one, f.module.register_literal(1.0f32));

    // Without loading, the result is the storage written to.
    let pointer =
        f.lower_no_load(&Expr::assign(Expr::ident(&x), Expr::literal(2.0f32))).unwrap();
    assert_eq!(pointer, f.id_of("x"));
    assert_eq!(f.opcodes(), [Op::Store, Op::Store]);
}

#[test]
fn dynamic_index_into_a_swizzle() {
    // v.xy[i]
    let mut f = Fixture::new();
    let v = local("v", Type::vec(Scalar::Float, 4));
    let i = local("i", Type::int());
    let expr =
        Expr::index(Expr::swizzle(Expr::ident(&v), "xy").unwrap(), Expr::ident(&i)).unwrap();
    let value = f.lower(&expr).unwrap();

    assert_eq!(f.opcodes(), [Op::Load, Op::VectorShuffle, Op::Load, Op::VectorExtractDynamic]);
    let extract = f.last(Op::VectorExtractDynamic);
    assert_eq!(extract.result_id, Some(value));
    assert_eq!(extract.operands[0], f.last(Op::VectorShuffle).result_id.unwrap());

    // Constant indices still compose into the swizzle.
    f.block.instructions.clear();
    let expr =
        Expr::index(Expr::swizzle(Expr::ident(&v), "zw").unwrap(), Expr::literal(1)).unwrap();
    f.lower(&expr).unwrap();
    assert_eq!(f.opcodes(), [Op::AccessChain, Op::Load]);
    assert_eq!(f.last(Op::AccessChain).operands[1], f.module.register_literal(3u32));
}

#[test]
fn nested_members_make_one_chain() {
    let mut f = Fixture::new();
    let a = local("a", nested_struct());
    let expr = Expr::member(Expr::member(Expr::ident(&a), 0).unwrap(), 0).unwrap();

    let steps = linearize(&expr).unwrap();
    assert!(matches!(steps[0], Step::Head(_)));
    assert_eq!(steps[1..], [Step::Member { index: 0, name: None }, Step::Member { index: 0, name: None }]);

    let pointer = f.lower_no_load(&expr).unwrap();
    let chain = f.last(Op::AccessChain);
    assert_eq!(chain.result_id, Some(pointer));
    assert_eq!(chain.operands.len(), 3);
    assert_eq!(chain.operands[0], f.id_of("a"));
    // Member indices are deduplicated constants.
    assert_eq!(chain.operands[1], chain.operands[2]);
    assert_eq!(chain.operands[1], f.module.register_member_variable_index(0));
}

#[test]
fn swizzles_compose_when_linearized() {
    let v = local("v", Type::vec(Scalar::Float, 4));
    let expr = Expr::swizzle(Expr::swizzle(Expr::ident(&v), "zyx").unwrap(), "xy").unwrap();
    let steps = linearize(&expr).unwrap();
    assert_eq!(steps.len(), 2);
    let Step::Swizzle(swizzle) = &steps[1] else { panic!("{steps:?}") };
    assert_eq!(swizzle.components(), [2, 1]);
}

#[test]
fn linearize_rejects_values() {
    let v = local("v", Type::vec(Scalar::Float, 4));
    let sum =
        Expr::binary(v.ty.clone(), BinOp::Add, Expr::ident(&v), Expr::ident(&v));
    let expr = Expr::swizzle(sum, "x").unwrap();
    assert!(matches!(linearize(&expr), Err(LowerError::NotChainable(_))));
}

#[test]
fn single_component_store() {
    // v.x = f;
    let mut f = Fixture::new();
    let v = local("v", Type::vec(Scalar::Float, 4));
    let s = local("s", Type::float());
    f.lower(&Expr::assign(Expr::swizzle(Expr::ident(&v), "x").unwrap(), Expr::ident(&s)))
        .unwrap();

    assert_eq!(f.opcodes(), [Op::AccessChain, Op::Load, Op::Store]);
    let chain = f.last(Op::AccessChain);
    assert_eq!(chain.operands[0], f.id_of("v"));
    assert_eq!(chain.operands[1], f.module.register_literal(0u32));
    assert_eq!(f.last(Op::Store).operands[0], chain.result_id.unwrap());
}

#[test]
fn multi_component_store_shuffles() {
    // v.xy = g;
    let mut f = Fixture::new();
    let v = local("v", Type::vec(Scalar::Float, 4));
    let g = local("g", Type::vec(Scalar::Float, 2));
    f.lower(&Expr::assign(Expr::swizzle(Expr::ident(&v), "xy").unwrap(), Expr::ident(&g)))
        .unwrap();

    assert_eq!(f.opcodes(), [Op::Load, Op::Load, Op::VectorShuffle, Op::Store]);
    let shuffle = f.last(Op::VectorShuffle);
    assert_eq!(shuffle.operands[2..], [4, 5, 2, 3]);
    assert_eq!(f.last(Op::Store).operands[0], f.id_of("v"));
}

#[test]
fn swizzle_of_a_value() {
    let mut f = Fixture::new();
    let v = local("v", Type::vec(Scalar::Float, 4));
    let sum = Expr::binary(v.ty.clone(), BinOp::Add, Expr::ident(&v), Expr::ident(&v));
    f.lower(&Expr::swizzle(sum.clone(), "zx").unwrap()).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::Load, Op::FAdd, Op::VectorShuffle]);
    assert_eq!(f.last(Op::VectorShuffle).operands[2..], [2, 0]);

    f.block.instructions.clear();
    f.lower(&Expr::swizzle(sum, "w").unwrap()).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::Load, Op::FAdd, Op::CompositeExtract]);
}

#[test]
fn compound_assignment() {
    let mut f = Fixture::new();
    let i = local("i", Type::int());
    f.lower(&Expr::compound_assign(BinOp::Mul, Expr::ident(&i), Expr::literal(3))).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::IMul, Op::Store]);
}

#[test]
fn post_increment_returns_old_value() {
    let mut f = Fixture::new();
    let i = local("i", Type::uint());
    let old = f.lower(&Expr::step(StepOp::PostInc, Expr::ident(&i))).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::IAdd, Op::Store]);
    assert_eq!(f.block.instructions[0].result_id, Some(old));

    let new = f.lower(&Expr::step(StepOp::PreDec, Expr::ident(&i))).unwrap();
    assert_eq!(f.last(Op::ISub).result_id, Some(new));
}

#[test]
fn literals_are_deduplicated() {
    let mut f = Fixture::new();
    let one = f.lower(&Expr::literal(1.0f32)).unwrap();
    assert_eq!(f.lower(&Expr::literal(1.0f32)).unwrap(), one);
    assert_ne!(f.lower(&Expr::literal(1)).unwrap(), one);
    assert_ne!(f.lower(&Expr::literal(-0.0f32)).unwrap(), f.lower(&Expr::literal(0.0f32)).unwrap());
    assert!(f.block.instructions.is_empty());
}

#[test]
fn constant_vector_construction() {
    let mut f = Fixture::new();
    let ty = Type::vec(Scalar::Float, 3);
    let args = || vec![Expr::literal(1.0f32), Expr::literal(2.0f32), Expr::literal(3.0f32)];

    let id = f.lower(&Expr::construct(ty.clone(), args())).unwrap();
    assert_eq!(f.lower(&Expr::construct(ty, args())).unwrap(), id);
    assert!(f.block.instructions.is_empty());
    let composite = f.module.declarations.iter().find(|inst| inst.result_id == Some(id)).unwrap();
    assert_eq!(composite.opcode, Op::ConstantComposite);
}

#[test]
fn constructor_literals_are_converted() {
    let mut f = Fixture::new();
    // vec2(1, 2u) has float constituents.
    let id = f
        .lower(&Expr::construct(
            Type::vec(Scalar::Float, 2),
            vec![Expr::literal(1), Expr::literal(2u32)],
        ))
        .unwrap();
    let composite =
        f.module.declarations.iter().find(|inst| inst.result_id == Some(id)).unwrap().clone();
    assert_eq!(composite.operands[0], f.module.register_literal(1.0f32));
    assert_eq!(composite.operands[1], f.module.register_literal(2.0f32));
}

#[test]
fn diagonal_matrix() {
    let mut f = Fixture::new();
    let s = local("s", Type::float());
    let mat2 = Type::Matrix { scalar: Scalar::Float, columns: 2, rows: 2 };
    f.lower(&Expr::construct(mat2, vec![Expr::ident(&s)])).unwrap();
    assert_eq!(
        f.opcodes(),
        [Op::Load, Op::CompositeConstruct, Op::CompositeConstruct, Op::CompositeConstruct]
    );
}

#[test]
fn casts() {
    let mut f = Fixture::new();
    let i = local("i", Type::int());
    let b = local("b", Type::bool());

    f.lower(&Expr::cast(Type::float(), Expr::ident(&i))).unwrap();
    assert!(f.opcodes().contains(&Op::ConvertSToF));

    f.lower(&Expr::cast(Type::uint(), Expr::ident(&b))).unwrap();
    assert!(f.opcodes().contains(&Op::Select));

    f.lower(&Expr::cast(Type::bool(), Expr::ident(&i))).unwrap();
    assert!(f.opcodes().contains(&Op::INotEqual));

    // Same-width reinterpretation between signed and unsigned.
    f.block.instructions.clear();
    f.lower(&Expr::cast(Type::uint(), Expr::ident(&i))).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::Bitcast]);
}

#[test]
fn vector_equality_reduces() {
    let mut f = Fixture::new();
    let v = local("v", Type::vec(Scalar::Int, 3));
    f.lower(&Expr::binary(Type::bool(), BinOp::Eq, Expr::ident(&v), Expr::ident(&v))).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::Load, Op::IEqual, Op::All]);

    f.block.instructions.clear();
    f.lower(&Expr::binary(Type::bool(), BinOp::Ne, Expr::ident(&v), Expr::ident(&v))).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::Load, Op::INotEqual, Op::Any]);
}

#[test]
fn matrix_times_vector() {
    let mut f = Fixture::new();
    let m = local("m", Type::Matrix { scalar: Scalar::Float, columns: 4, rows: 4 });
    let v = local("v", Type::vec(Scalar::Float, 4));
    f.lower(&Expr::binary(v.ty.clone(), BinOp::Mul, Expr::ident(&m), Expr::ident(&v))).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::Load, Op::MatrixTimesVector]);

    f.block.instructions.clear();
    f.lower(&Expr::binary(v.ty.clone(), BinOp::Mul, Expr::ident(&v), Expr::literal(2.0f32)))
        .unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::VectorTimesScalar]);
}

#[test]
fn vector_select_splats_condition_before_1_4() {
    let vec2 = Type::vec(Scalar::Float, 2);
    let select = |c: &Var, v: &Var| Expr::select(Expr::ident(c), Expr::ident(v), Expr::ident(v));

    let mut f = Fixture::new();
    let (c, v) = (local("c", Type::bool()), local("v", vec2.clone()));
    f.lower(&select(&c, &v)).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::Load, Op::Load, Op::CompositeConstruct, Op::Select]);

    let mut f = Fixture::with_config(BuildConfig { version: (1, 4), ..BuildConfig::default() });
    f.lower(&select(&c, &v)).unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::Load, Op::Load, Op::Select]);
}

#[test]
fn spec_constant_integer_ops_are_folded() {
    let mut f = Fixture::new();
    let n = Variable::new("N", Type::int(), VarFlags::SPECIALIZATION_CONSTANT);
    f.module.register_spec_constant("N", 0, &Type::int(), 4.into()).unwrap();

    let id = f
        .lower(&Expr::binary(Type::int(), BinOp::Mul, Expr::ident(&n), Expr::literal(2)))
        .unwrap();
    assert!(f.block.instructions.is_empty());
    let op = f.module.declarations.last().unwrap();
    assert_eq!((op.opcode, op.result_id), (Op::SpecConstantOp, Some(id)));
    assert_eq!(op.operands[0], Op::IMul as u32);
}

#[test]
fn dynamic_index_of_a_value_goes_through_storage() {
    let mut f = Fixture::new();
    let i = local("i", Type::int());
    let array = Expr::construct(
        Type::array(Type::float(), Some(3)),
        vec![Expr::literal(1.0f32), Expr::literal(2.0f32), Expr::ident(&local("x", Type::float()))],
    );
    let expr = Expr::index(array, Expr::ident(&i)).unwrap();
    f.lower(&expr).unwrap();
    assert_eq!(
        f.opcodes(),
        [Op::Load, Op::CompositeConstruct, Op::Load, Op::Store, Op::AccessChain, Op::Load]
    );
}

#[test]
fn calls_pass_outputs_by_pointer() {
    let mut f = Fixture::new();
    let input = Variable::new("x", Type::float(), VarFlags::PARAMETER);
    let output = Variable::new("y", Type::float(), VarFlags::OUTPUT_PARAMETER);
    let callee = Variable::new(
        "g",
        Type::Function(std::rc::Rc::new(shader_lower::ast::FunctionType {
            ret: Type::Void,
            params: vec![input, output],
        })),
        VarFlags::empty(),
    );

    let a = local("a", Type::float());
    let b = local("b", Type::float());
    f.lower(&Expr::call(&callee, vec![Expr::ident(&a), Expr::ident(&b)]).unwrap()).unwrap();

    let call = f.last(Op::FunctionCall);
    assert_eq!(call.operands[0], f.module.function_id("g"));
    // `b` is already in `Function` storage, so it's passed directly.
    assert_eq!(call.operands[2], f.id_of("b"));

    let err = f.lower(&Expr::call(&callee, vec![Expr::ident(&a)]).unwrap()).unwrap_err();
    assert!(matches!(err, LowerError::ArgCount { expected: 2, found: 1, .. }));
}

#[test]
fn glsl_intrinsics_pick_opcodes_by_type() {
    let mut f = Fixture::new();
    let x = local("x", Type::float());
    let i = local("i", Type::int());

    f.lower(&Expr::intrinsic(Type::float(), Intrinsic::Abs, vec![Expr::ident(&x)])).unwrap();
    let ext = f.last(Op::ExtInst);
    assert_eq!(ext.operands[0], f.module.glsl_std_450());
    assert_eq!(ext.operands[1], spirv::GLOp::FAbs as u32);

    f.lower(&Expr::intrinsic(Type::int(), Intrinsic::Abs, vec![Expr::ident(&i)])).unwrap();
    assert_eq!(f.last(Op::ExtInst).operands[1], spirv::GLOp::SAbs as u32);

    let err = f
        .lower(&Expr::intrinsic(Type::bool(), Intrinsic::Abs, vec![Expr::literal(true)]))
        .unwrap_err();
    assert!(!err.is_contract_violation());
}

#[test]
fn atomics_take_scope_and_semantics() {
    let mut f = Fixture::new();
    let counter = Variable::new("counter", Type::uint(), VarFlags::STORAGE_BUFFER);
    f.lower(&Expr::intrinsic(
        Type::uint(),
        Intrinsic::AtomicCompSwap,
        vec![Expr::ident(&counter), Expr::literal(1u32), Expr::literal(2u32)],
    ))
    .unwrap();

    let atomic = f.last(Op::AtomicCompareExchange);
    let device = f.module.register_literal(spirv::Scope::Device as u32);
    let acq_rel = f.module.register_literal(spirv::MemorySemantics::ACQUIRE_RELEASE.bits());
    let acquire = f.module.register_literal(spirv::MemorySemantics::ACQUIRE.bits());
    assert_eq!(atomic.operands[0], f.id_of("counter"));
    assert_eq!(atomic.operands[1..4], [device, acq_rel, acquire]);
    // Value, then comparator.
    assert_eq!(atomic.operands[4], f.module.register_literal(2u32));
    assert_eq!(atomic.operands[5], f.module.register_literal(1u32));
}

#[test]
fn buffer_atomics_acquire_and_release() {
    let mut f = Fixture::new();
    let counter = Variable::new("counter", Type::uint(), VarFlags::STORAGE_BUFFER);
    f.lower(&Expr::intrinsic(
        Type::uint(),
        Intrinsic::AtomicAdd,
        vec![Expr::ident(&counter), Expr::literal(1u32)],
    ))
    .unwrap();

    let atomic = f.last(Op::AtomicIAdd);
    assert_eq!(atomic.operands.len(), 4);
    assert_eq!(atomic.operands[2], f.module.register_literal(0x8u32));
    assert_eq!(atomic.operands[3], f.module.register_literal(1u32));

    // The value to add is missing.
    let err = f
        .lower(&Expr::intrinsic(Type::uint(), Intrinsic::AtomicAdd, vec![Expr::ident(&counter)]))
        .unwrap_err();
    assert!(matches!(err, LowerError::ArgCount { expected: 2, found: 1, .. }));
    let err = f
        .lower(&Expr::intrinsic(
            Type::uint(),
            Intrinsic::AtomicCompSwap,
            vec![Expr::ident(&counter), Expr::literal(1u32)],
        ))
        .unwrap_err();
    assert!(matches!(err, LowerError::ArgCount { expected: 3, found: 2, .. }));
}

fn storage_image(ms: bool) -> Var {
    let config = ImageConfig {
        ms,
        ..ImageConfig::storage(spirv::Dim::Dim2D, spirv::ImageFormat::R32ui, Scalar::UInt)
    };
    Variable::new("img", Type::Image(config), VarFlags::UNIFORM)
}

#[test]
fn image_atomics_go_through_a_texel_pointer() {
    let mut f = Fixture::new();
    let img = storage_image(false);
    let coord = local("coord", Type::vec(Scalar::Int, 2));
    f.lower(&Expr::image(
        Type::uint(),
        ImageAccess::AtomicAdd,
        vec![Expr::ident(&img), Expr::ident(&coord), Expr::literal(1u32)],
    ))
    .unwrap();
    assert_eq!(f.opcodes(), [Op::Load, Op::ImageTexelPointer, Op::AtomicIAdd]);

    let texel_pointer = f.last(Op::ImageTexelPointer);
    let coord_value = f.block.instructions[0].result_id.unwrap();
    let zero = f.module.register_literal(0u32);
    assert_eq!(texel_pointer.operands[..], [f.id_of("img"), coord_value, zero]);

    let pointer_type = f
        .module
        .declarations
        .iter()
        .find(|inst| inst.result_id == texel_pointer.result_type_id)
        .unwrap()
        .clone();
    assert_eq!(pointer_type.opcode, Op::TypePointer);
    assert_eq!(pointer_type.operands[0], spirv::StorageClass::Image as u32);

    let atomic = f.last(Op::AtomicIAdd);
    let image_memory = f.module.register_literal(spirv::MemorySemantics::IMAGE_MEMORY.bits());
    assert_eq!(image_memory, f.module.register_literal(0x800u32));
    assert_eq!(atomic.operands[0], texel_pointer.result_id.unwrap());
    assert_eq!(atomic.operands[2], image_memory);
}

#[test]
fn multisampled_image_atomics_use_the_sample() {
    let mut f = Fixture::new();
    let img = storage_image(true);
    let coord = local("coord", Type::vec(Scalar::Int, 2));
    let sample = local("sample", Type::int());
    f.lower(&Expr::image(
        Type::uint(),
        ImageAccess::AtomicCompSwap,
        vec![
            Expr::ident(&img),
            Expr::ident(&coord),
            Expr::ident(&sample),
            Expr::literal(1u32),
            Expr::literal(2u32),
        ],
    ))
    .unwrap();
    assert_eq!(
        f.opcodes(),
        [Op::Load, Op::Load, Op::ImageTexelPointer, Op::AtomicCompareExchange]
    );

    let sample_value = f.block.instructions[1].result_id.unwrap();
    assert_eq!(f.last(Op::ImageTexelPointer).operands[2], sample_value);

    let image_memory = f.module.register_literal(spirv::MemorySemantics::IMAGE_MEMORY.bits());
    let atomic = f.last(Op::AtomicCompareExchange);
    assert_eq!(atomic.operands[2..4], [image_memory, image_memory]);
    assert_eq!(atomic.operands[4], f.module.register_literal(2u32));
    assert_eq!(atomic.operands[5], f.module.register_literal(1u32));
}

#[test]
fn opaque_arguments_are_copied_into_function_storage() {
    let mut f = Fixture::new();
    let sampled = Type::SampledImage(ImageConfig::sampled_2d());
    let param = Variable::new("t", sampled.clone(), VarFlags::PARAMETER);
    let callee = Variable::new(
        "sample_it",
        Type::Function(std::rc::Rc::new(shader_lower::ast::FunctionType {
            ret: Type::Void,
            params: vec![param],
        })),
        VarFlags::empty(),
    );
    let tex = Variable::new("tex", sampled, VarFlags::UNIFORM);
    f.lower(&Expr::call(&callee, vec![Expr::ident(&tex)]).unwrap()).unwrap();

    assert_eq!(f.opcodes(), [Op::Load, Op::Store, Op::FunctionCall]);
    let temp = f.last(Op::Store).operands[0];
    assert_ne!(temp, f.id_of("tex"));
    assert_eq!(f.last(Op::FunctionCall).operands[1], temp);

    let temp_decl =
        f.func.function.variables.iter().find(|inst| inst.result_id == Some(temp)).unwrap();
    assert_eq!(temp_decl.operands[..], [spirv::StorageClass::Function as u32]);
}

#[test]
fn carry_is_written_back() {
    let mut f = Fixture::new();
    let (x, c) = (local("x", Type::uint()), local("c", Type::uint()));
    f.lower(&Expr::intrinsic(
        Type::uint(),
        Intrinsic::UaddCarry,
        vec![Expr::ident(&x), Expr::ident(&x), Expr::ident(&c)],
    ))
    .unwrap();
    assert_eq!(
        f.opcodes(),
        [Op::Load, Op::Load, Op::IAddCarry, Op::CompositeExtract, Op::CompositeExtract, Op::Store]
    );
    assert_eq!(f.last(Op::Store).operands[0], f.id_of("c"));
}

#[test]
fn texture_sampling() {
    let mut f = Fixture::new();
    let tex = Variable::new("tex", Type::SampledImage(ImageConfig::sampled_2d()), VarFlags::UNIFORM);
    let uv = local("uv", Type::vec(Scalar::Float, 2));
    let vec4 = Type::vec(Scalar::Float, 4);

    f.lower(&Expr::texture(
        vec4.clone(),
        TextureAccess::SampleLod,
        vec![Expr::ident(&tex), Expr::ident(&uv), Expr::literal(0.0f32)],
    ))
    .unwrap();
    let sample = f.last(Op::ImageSampleExplicitLod);
    assert_eq!(sample.operands[2], spirv::ImageOperands::LOD.bits());

    let offset = Expr::construct(Type::vec(Scalar::Int, 2), vec![Expr::literal(1), Expr::literal(1)]);
    f.lower(&Expr::texture(
        vec4.clone(),
        TextureAccess::SampleOffset,
        vec![Expr::ident(&tex), Expr::ident(&uv), offset],
    ))
    .unwrap();
    let sample = f.last(Op::ImageSampleImplicitLod);
    assert_eq!(sample.operands[2], spirv::ImageOperands::CONST_OFFSET.bits());

    f.lower(&Expr::texture(
        Type::vec(Scalar::Int, 2),
        TextureAccess::SizeLod,
        vec![Expr::ident(&tex), Expr::literal(0)],
    ))
    .unwrap();
    assert!(f.opcodes().ends_with(&[Op::Image, Op::ImageQuerySizeLod]));

    let err = f
        .lower(&Expr::texture(vec4, TextureAccess::SampleBias, vec![Expr::ident(&tex)]))
        .unwrap_err();
    assert!(matches!(err, LowerError::ArgCount { expected: 3, .. }));
}

#[test]
fn image_store_has_no_value() {
    let mut f = Fixture::new();
    let config =
        ImageConfig::storage(spirv::Dim::Dim2D, spirv::ImageFormat::Rgba8, Scalar::Float);
    let img = Variable::new("img", Type::Image(config), VarFlags::UNIFORM);
    let coord = Expr::construct(Type::vec(Scalar::Int, 2), vec![Expr::literal(0), Expr::literal(0)]);
    let texel = local("texel", Type::vec(Scalar::Float, 4));

    let id = f
        .lower(&Expr::image(
            Type::Void,
            ImageAccess::Store,
            vec![Expr::ident(&img), coord, Expr::ident(&texel)],
        ))
        .unwrap();
    assert_eq!(id, shader_lower::lower::NO_VALUE);
    let write = f.last(Op::ImageWrite);
    assert_eq!(write.result_id, None);
    assert_eq!(write.operands.len(), 3);
}

#[test]
fn nesting_limit() {
    let mut f =
        Fixture::with_config(BuildConfig { max_expr_depth: 4, ..BuildConfig::default() });
    let mut expr = Expr::literal(1);
    for _ in 0..8 {
        expr = Expr::binary(Type::int(), BinOp::Add, expr, Expr::literal(1));
    }
    assert!(matches!(f.lower(&expr), Err(LowerError::TooDeep(4))));
}

#[test]
fn assigning_to_a_value_fails() {
    let mut f = Fixture::new();
    let err = f.lower(&Expr::assign(Expr::literal(1), Expr::literal(2))).unwrap_err();
    assert!(matches!(err, LowerError::NotAssignable(_)));
    assert!(err.is_contract_violation());
}
