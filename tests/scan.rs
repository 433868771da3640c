use shader_lower::ast::{
    BinOp, Expr, ImageAccess, ImageConfig, Scalar, TextureAccess, Type, VarFlags, Variable,
};
use shader_lower::scan::{scan_expr, ModuleRequirements};
use spirv::Capability;

fn scan(exprs: &[Expr]) -> ModuleRequirements {
    let mut reqs = ModuleRequirements::default();
    for expr in exprs {
        scan_expr(expr, &mut reqs);
    }
    reqs
}

fn uv() -> Expr {
    Expr::ident(&Variable::new("uv", Type::vec(Scalar::Float, 2), VarFlags::SHADER_INPUT))
}

#[test]
fn interface_variables() {
    let color = Variable::new("color", Type::vec(Scalar::Float, 4), VarFlags::SHADER_OUTPUT);
    let tint = Variable::new("tint", Type::vec(Scalar::Float, 4), VarFlags::SHADER_INPUT);
    let assign = Expr::assign(Expr::ident(&color), Expr::ident(&tint));

    // Scanning the same expression twice doesn't duplicate anything.
    let reqs = scan(&[assign.clone(), assign]);
    assert_eq!(reqs.inputs.keys().collect::<Vec<_>>(), ["tint"]);
    assert_eq!(reqs.outputs.keys().collect::<Vec<_>>(), ["color"]);
    assert!(reqs.capabilities.is_empty());
}

#[test]
fn block_members_are_not_outputs() {
    let block = Variable::new(
        "gl_PerVertex",
        Type::structure(shader_lower::ast::StructType::new(
            "gl_PerVertex",
            Default::default(),
            [("gl_Position".to_string(), Type::vec(Scalar::Float, 4))],
        )),
        VarFlags::SHADER_OUTPUT,
    );
    let position =
        Variable::member_of(&block, 0, "gl_Position", Type::vec(Scalar::Float, 4));
    let reqs = scan(&[Expr::ident(&position)]);
    assert!(reqs.outputs.is_empty());
}

#[test]
fn doubles_need_float64() {
    let d = Variable::new("d", Type::double(), VarFlags::LOCAL);
    let reqs = scan(&[Expr::binary(Type::double(), BinOp::Add, Expr::ident(&d), Expr::literal(1.0f64))]);
    assert!(reqs.requires(Capability::Float64));

    let dvec = Type::vec(Scalar::Double, 3);
    let reqs = scan(&[Expr::cast(dvec, uv())]);
    assert!(reqs.requires(Capability::Float64));
}

#[test]
fn texture_queries_and_gathers() {
    let tex = Variable::new("tex", Type::SampledImage(ImageConfig::sampled_2d()), VarFlags::UNIFORM);
    let ivec2 = Type::vec(Scalar::Int, 2);
    let vec4 = Type::vec(Scalar::Float, 4);

    let size = Expr::texture(ivec2.clone(), TextureAccess::SizeLod, vec![Expr::ident(&tex), Expr::literal(0)]);
    assert!(scan(&[size]).requires(Capability::ImageQuery));

    let constant_offset = Expr::construct(ivec2.clone(), vec![Expr::literal(1), Expr::literal(0)]);
    let gather = Expr::texture(
        vec4.clone(),
        TextureAccess::GatherOffset,
        vec![Expr::ident(&tex), uv(), Expr::literal(0), constant_offset],
    );
    assert!(!scan(&[gather]).requires(Capability::ImageGatherExtended));

    let offset = Variable::new("offset", ivec2, VarFlags::LOCAL);
    let gather = Expr::texture(
        vec4,
        TextureAccess::GatherOffset,
        vec![Expr::ident(&tex), uv(), Expr::literal(0), Expr::ident(&offset)],
    );
    let reqs = scan(&[gather]);
    assert!(reqs.requires(Capability::ImageGatherExtended));
    assert!(!reqs.requires(Capability::ImageQuery));
    // Arguments are scanned too.
    assert_eq!(reqs.inputs.keys().collect::<Vec<_>>(), ["uv"]);
}

#[test]
fn image_dimensionalities() {
    let sampled = |dim, arrayed| {
        let config = ImageConfig { dim, arrayed, ..ImageConfig::sampled_2d() };
        let tex = Variable::new("tex", Type::SampledImage(config), VarFlags::UNIFORM);
        scan(&[Expr::texture(
            Type::vec(Scalar::Float, 4),
            TextureAccess::Sample,
            vec![Expr::ident(&tex), uv()],
        )])
    };
    assert!(sampled(spirv::Dim::Dim1D, false).requires(Capability::Sampled1D));
    assert!(sampled(spirv::Dim::DimBuffer, false).requires(Capability::SampledBuffer));
    assert!(sampled(spirv::Dim::DimCube, true).requires(Capability::SampledCubeArray));
    assert!(sampled(spirv::Dim::DimCube, false).capabilities.is_empty());
    assert!(sampled(spirv::Dim::Dim2D, true).capabilities.is_empty());

    let config = ImageConfig {
        ms: true,
        arrayed: true,
        ..ImageConfig::storage(spirv::Dim::Dim2D, spirv::ImageFormat::R32ui, Scalar::UInt)
    };
    let img = Variable::new("img", Type::Image(config), VarFlags::UNIFORM);
    let reqs = scan(&[Expr::image(Type::Scalar(Scalar::Int), ImageAccess::Samples, vec![Expr::ident(&img)])]);
    assert!(reqs.requires(Capability::ImageQuery));
    assert!(reqs.requires(Capability::ImageMSArray));
}
