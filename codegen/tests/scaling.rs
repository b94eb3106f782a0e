use anyhow::Result;
use osy_codegen::{Codegen, CodegenError, GenerateOptions, ScalingSupport};
use osy_core::{Node, Scaling};
use testutil::{fixtures::*, util::*};

fn scaled_node(factor: f64) -> Node {
    let mut node = nvm_node();
    node.datapools[0].lists[0].elements[1].scaling = Scaling {
        factor,
        offset: 0.0,
    };
    node
}

fn with(scaling: ScalingSupport) -> GenerateOptions {
    GenerateOptions {
        scaling,
        ..Default::default()
    }
}

fn config_error(res: Result<impl Sized>) -> bool {
    res.is_err_and(|e| matches!(e.downcast_ref::<CodegenError>(), Some(CodegenError::Config(_))))
}

#[test]
fn factor_vanishing_in_float32_rejected() -> Result<()> {
    let node = scaled_node(1e-50);

    assert!(config_error(generate_into_tempdir(&node, "Main", with(ScalingSupport::Float32))));
    generate_into_tempdir(&node, "Main", with(ScalingSupport::Float64))?;
    generate_into_tempdir(&node, "Main", with(ScalingSupport::None))?;

    Ok(())
}

#[test]
fn non_positive_factor_rejected() {
    for factor in [0.0, -2.5] {
        let node = scaled_node(factor);
        assert!(config_error(generate_into_tempdir(&node, "Main", with(ScalingSupport::Float32))));
        assert!(config_error(generate_into_tempdir(&node, "Main", with(ScalingSupport::Float64))));
        assert!(config_error(generate_into_tempdir(&node, "Main", with(ScalingSupport::None))));
    }
}

#[test]
fn scaling_defines_emitted() -> Result<()> {
    let node = scaled_node(0.5);

    let (_dir, files) = generate_into_tempdir(&node, "Main", with(ScalingSupport::Float32))?;
    let header = read_generated(&files, "settings_data_pool.h")?;
    assert!(header.contains("#define SETTINGS_CONFIG_B_FACTOR (0.5F)"));

    let (_dir, files) = generate_into_tempdir(&node, "Main", with(ScalingSupport::None))?;
    let header = read_generated(&files, "settings_data_pool.h")?;
    assert!(!header.contains("_FACTOR"));

    Ok(())
}

#[test]
fn rejected_pool_leaves_no_files() -> Result<()> {
    let node = scaled_node(0.0);
    let dir = tempfile::tempdir()?;

    let res = Codegen::new(&node, "Main", with(ScalingSupport::Float32))?.generate(dir.path());
    assert!(matches!(res, Err(CodegenError::Config(_))));

    // osy_init comes first and stays
    assert!(dir.path().join("osy_init.c").exists());
    assert!(!dir.path().join("settings_data_pool.h").exists());
    assert!(!dir.path().join("settings_data_pool.c").exists());

    let dir = tempfile::tempdir()?;
    let res = Codegen::new(&node, "Main", with(ScalingSupport::None))?.generate(dir.path());
    assert!(matches!(res, Err(CodegenError::Config(_))));
    assert!(!dir.path().join("settings_data_pool.h").exists());

    Ok(())
}
