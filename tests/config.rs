use shader_lower::BuildConfig;

#[test]
fn missing_fields_take_defaults() {
    let config: BuildConfig =
        serde_json::from_str(r#"{ "version": [1, 3], "max_expr_depth": 32 }"#).unwrap();
    assert_eq!(config.version, (1, 3));
    assert_eq!(config.max_expr_depth, 32);
    assert_eq!(config.execution_model, BuildConfig::default().execution_model);
    assert_eq!(config.version_word(), 0x0001_0300);

    let empty: BuildConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, BuildConfig::default());
}

#[test]
fn enums_by_name() {
    let config: BuildConfig = serde_json::from_str(
        r#"{ "execution_model": "Fragment", "fragment_origin": "OriginLowerLeft" }"#,
    )
    .unwrap();
    assert_eq!(config.execution_model, spirv::ExecutionModel::Fragment);
    assert_eq!(config.fragment_origin, spirv::ExecutionMode::OriginLowerLeft);

    assert!(serde_json::from_str::<BuildConfig>(r#"{ "execution_model": "Teapot" }"#).is_err());
}

#[test]
fn json_roundtrip() {
    let config = BuildConfig {
        generator: 0x1234_0001,
        ..BuildConfig::new(spirv::ExecutionModel::GLCompute)
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(serde_json::from_str::<BuildConfig>(&json).unwrap(), config);
}
