use serde_json::json;
use toolflow::state::Segment;
use toolflow::tools::{
    FileTransferMethod, FileType, FileVar, ToolParameter, ToolParameterForm, ToolParameterType,
    ToolProviderType,
};
use toolflow::workflow::{extract_variable_selector_mapping, ParameterBinder, ToolInput, ToolNodeData};
use toolflow::{ErrorKind, Selector, VariablePool};

fn parameter(name: &str, parameter_type: ToolParameterType) -> ToolParameter {
    ToolParameter::new(name, parameter_type, ToolParameterForm::Llm)
}

fn pool() -> anyhow::Result<VariablePool> {
    let pool = VariablePool::new();
    pool.add(&Selector::parse("start.city"), "Berlin")?;
    pool.add(&Selector::parse("start.days"), 3i64)?;
    pool.add(
        &Selector::parse("env.api_key"),
        Segment::Secret("sk-abcdefghijklmnop".into()),
    )?;
    pool.add(
        &Selector::parse("llm.result"),
        Segment::from_value(json!({"summary": {"title": "Forecast"}})),
    )?;
    Ok(pool)
}

fn attachment() -> FileVar {
    FileVar {
        id: Some("f-1".into()),
        tenant_id: "tenant-1".into(),
        file_type: FileType::Document,
        transfer_method: FileTransferMethod::LocalFile,
        url: Some("https://files.example.com/f-1.pdf".into()),
        related_id: Some("f-1".into()),
        filename: Some("brief.pdf".into()),
        extension: Some(".pdf".into()),
        mime_type: Some("application/pdf".into()),
    }
}

#[test]
fn binds_each_input_kind() -> anyhow::Result<()> {
    let declared = vec![
        parameter("city", ToolParameterType::String),
        parameter("days", ToolParameterType::Number),
        parameter("prompt", ToolParameterType::String),
        parameter("title", ToolParameterType::String),
        parameter("limit", ToolParameterType::Number),
    ];
    let data = ToolNodeData::new(ToolProviderType::BuiltIn, "weather", "forecast")
        .with_parameter("city", ToolInput::variable(&Selector::parse("start.city")))
        .with_parameter("days", ToolInput::variable(&Selector::parse("start.days")))
        .with_parameter(
            "prompt",
            ToolInput::mixed("Weather in {{#start.city#}} for {{#start.days#}} days"),
        )
        .with_parameter(
            "title",
            ToolInput::variable(&Selector::parse("llm.result.summary.title")),
        )
        .with_parameter("limit", ToolInput::constant(10));

    let params = ParameterBinder::generate_parameters(&declared, &data, &pool()?, false)?;
    assert_eq!(params["city"], json!("Berlin"));
    assert_eq!(params["days"], json!(3));
    assert_eq!(params["prompt"], json!("Weather in Berlin for 3 days"));
    assert_eq!(params["title"], json!("Forecast"));
    assert_eq!(params["limit"], json!("10"));
    Ok(())
}

#[test]
fn non_string_constants_render_as_text() -> anyhow::Result<()> {
    let declared = vec![
        parameter("days", ToolParameterType::Number),
        parameter("metric", ToolParameterType::Boolean),
        parameter("label", ToolParameterType::String),
    ];
    let data = ToolNodeData::new(ToolProviderType::BuiltIn, "weather", "forecast")
        .with_parameter("days", ToolInput::constant(3))
        .with_parameter("metric", ToolInput::constant(true))
        .with_parameter("label", ToolInput::constant("{{#start.city#}}"));

    let pool = pool()?;
    let params = ParameterBinder::generate_parameters(&declared, &data, &pool, false)?;
    assert_eq!(params["days"], json!("3"));
    assert_eq!(params["metric"], json!("true"));
    assert_eq!(params["label"], json!("Berlin"));

    let logged = ParameterBinder::generate_parameters(&declared, &data, &pool, true)?;
    assert_eq!(logged, params);
    Ok(())
}

#[test]
fn undeclared_parameter_binds_null() -> anyhow::Result<()> {
    let declared = vec![parameter("city", ToolParameterType::String)];
    let data = ToolNodeData::new(ToolProviderType::BuiltIn, "weather", "forecast")
        .with_parameter("city", ToolInput::constant("Paris"))
        .with_parameter("legacy", ToolInput::constant("ignored"));

    let params = ParameterBinder::generate_parameters(&declared, &data, &pool()?, false)?;
    assert_eq!(params["city"], json!("Paris"));
    assert_eq!(params["legacy"], json!(null));
    assert_eq!(params.len(), 2);
    Ok(())
}

#[test]
fn file_parameter_binds_system_files() -> anyhow::Result<()> {
    let declared = vec![parameter("document", ToolParameterType::File)];
    let data = ToolNodeData::new(ToolProviderType::BuiltIn, "reader", "summarize")
        .with_parameter("document", ToolInput::constant("whatever"));

    let pool = pool()?;
    let empty = ParameterBinder::generate_parameters(&declared, &data, &pool, false)?;
    assert_eq!(empty["document"], json!([]));

    pool.add_system_files(vec![attachment()]);
    let params = ParameterBinder::generate_parameters(&declared, &data, &pool, false)?;
    let files = params["document"].as_array().cloned().unwrap_or_default();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filename"], json!("brief.pdf"));
    assert_eq!(files[0]["type"], json!("document"));
    Ok(())
}

#[test]
fn missing_variable_is_reported() -> anyhow::Result<()> {
    let declared = vec![parameter("city", ToolParameterType::String)];
    let data = ToolNodeData::new(ToolProviderType::BuiltIn, "weather", "forecast")
        .with_parameter("city", ToolInput::variable(&Selector::parse("start.country")));

    let err = ParameterBinder::generate_parameters(&declared, &data, &pool()?, false)
        .expect_err("unknown variable");
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("start.country"));
    Ok(())
}

#[test]
fn unresolved_template_reference_is_kept_literally() -> anyhow::Result<()> {
    let declared = vec![parameter("prompt", ToolParameterType::String)];
    let data = ToolNodeData::new(ToolProviderType::BuiltIn, "weather", "forecast")
        .with_parameter("prompt", ToolInput::mixed("Hi {{#start.nobody#}}"));

    let params = ParameterBinder::generate_parameters(&declared, &data, &pool()?, false)?;
    assert_eq!(params["prompt"], json!("Hi {{#start.nobody#}}"));
    Ok(())
}

#[test]
fn log_rendering_masks_secrets_with_same_keys() -> anyhow::Result<()> {
    let declared = vec![
        parameter("auth", ToolParameterType::SecretInput),
        parameter("city", ToolParameterType::String),
    ];
    let data = ToolNodeData::new(ToolProviderType::BuiltIn, "weather", "forecast")
        .with_parameter("auth", ToolInput::mixed("Bearer {{#env.api_key#}}"))
        .with_parameter("city", ToolInput::variable(&Selector::parse("start.city")));
    let pool = pool()?;

    let params = ParameterBinder::generate_parameters(&declared, &data, &pool, false)?;
    let logged = ParameterBinder::generate_parameters(&declared, &data, &pool, true)?;

    let keys: Vec<&String> = params.keys().collect();
    let logged_keys: Vec<&String> = logged.keys().collect();
    assert_eq!(keys, logged_keys);

    assert_eq!(params["auth"], json!("Bearer sk-abcdefghijklmnop"));
    let masked = logged["auth"].as_str().unwrap_or_default();
    assert!(masked.starts_with("Bearer sk-abc"));
    assert!(!masked.contains("defghijklmn"));
    assert_eq!(logged["city"], params["city"]);
    Ok(())
}

#[test]
fn selector_mapping_covers_variables_and_templates() {
    let data = ToolNodeData::new(ToolProviderType::BuiltIn, "weather", "forecast")
        .with_parameter("city", ToolInput::variable(&Selector::parse("start.city")))
        .with_parameter(
            "prompt",
            ToolInput::mixed("{{#start.city#}} / {{#llm.result.summary#}}"),
        )
        .with_parameter("limit", ToolInput::constant(5));

    let mapping = extract_variable_selector_mapping("tool1", &data);
    assert_eq!(mapping.len(), 3);
    assert_eq!(mapping["tool1.city"], vec!["start", "city"]);
    assert_eq!(mapping["tool1.#start.city#"], vec!["start", "city"]);
    assert_eq!(
        mapping["tool1.#llm.result.summary#"],
        vec!["llm", "result", "summary"]
    );
}
