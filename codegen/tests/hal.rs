use anyhow::Result;
use osy_codegen::{Codegen, CodegenError, GenerateOptions};
use osy_core::HalcSafetyMode;
use testutil::{fixtures::*, util::*};

#[test]
fn two_level_with_dropping_splits_channels() -> Result<()> {
    let node = halc_node(HalcSafetyMode::TwoLevelWithDropping);
    let (_dir, files) = generate_into_tempdir(&node, "Firmware", GenerateOptions::default())?;

    let names = file_names(&files);
    for f in [
        "hal_safe_configuration.h",
        "hal_safe_configuration.c",
        "hal_non_safe_configuration.h",
        "hal_non_safe_configuration.c",
    ] {
        assert!(names.contains(&f.to_string()), "{f} missing");
    }

    let safe = read_generated(&files, "hal_safe_configuration.h")?;
    assert!(safe.contains("#define HAL_DIGITAL_INPUTS_CH_DI0 (0U)"));
    assert!(safe.contains("#define HAL_DIGITAL_INPUTS_CH_DI2 (1U)"));
    assert!(safe.contains("#define HAL_DIGITAL_INPUTS_NUMBER_OF_CHANNELS (2U)"));
    assert!(!safe.contains("DI1"));
    assert!(!safe.contains("u8_SafetyRelevant"));

    let non_safe = read_generated(&files, "hal_non_safe_configuration.h")?;
    assert!(non_safe.contains("#define HAL_DIGITAL_INPUTS_CH_DI1 (0U)"));
    assert!(non_safe.contains("#define HAL_DIGITAL_INPUTS_NUMBER_OF_CHANNELS (1U)"));

    // DI2 keeps its channel number but sits in slot 1 of the pool arrays
    let source = read_generated(&files, "hal_safe_configuration.c")?;
    assert!(source.contains(
        "{ 2U, 1U, &gt_halcsafe_DataPoolValues.t_Configuration.au16_DigitalInput_Debounce[1], \
         &gt_halcsafe_DataPoolValues.t_Inputs.au8_DigitalInput_Value[1] }, ///< DI2"
    ));
    assert!(source.contains("const T_hal_system * const gpt_hal_System = &mt_System;"));
    assert!(source.contains(
        "const T_hal_digital_input * const gpt_hal_DigitalInputs = &mat_DigitalInputs[0];"
    ));

    Ok(())
}

#[test]
fn two_level_without_dropping_flags_channels() -> Result<()> {
    let node = halc_node(HalcSafetyMode::TwoLevelWithoutDropping);
    let (_dir, files) = generate_into_tempdir(&node, "Firmware", GenerateOptions::default())?;

    for f in ["hal_safe_configuration.h", "hal_non_safe_configuration.h"] {
        let header = read_generated(&files, f)?;
        assert!(header.contains("#define HAL_DIGITAL_INPUTS_NUMBER_OF_CHANNELS (3U)"));
        assert!(header.contains("uint8 u8_SafetyRelevant;"));
        assert!(header.contains("const uint16 * pu16_Debounce;"));
        assert!(header.contains("uint8 * pu8_Value;"));
    }

    let source = read_generated(&files, "hal_non_safe_configuration.c")?;
    assert!(source.contains("{ 1U, 0U, 0U, "));

    Ok(())
}

#[test]
fn one_level_has_single_configuration() -> Result<()> {
    let node = halc_node(HalcSafetyMode::OneLevelAllNonSafe);
    let (_dir, files) = generate_into_tempdir(&node, "Firmware", GenerateOptions::default())?;

    let hal: Vec<_> = file_names(&files)
        .into_iter()
        .filter(|f| f.starts_with("hal_"))
        .collect();
    assert_eq!(hal, ["hal_configuration.h", "hal_configuration.c"]);

    Ok(())
}

#[test]
fn pool_count_must_match_mode() -> Result<()> {
    let mut node = halc_node(HalcSafetyMode::TwoLevelWithDropping);
    node.datapools.pop();

    let dir = tempfile::tempdir()?;
    let res = Codegen::new(&node, "Firmware", GenerateOptions::default())?.generate(dir.path());
    assert!(matches!(res, Err(CodegenError::Config(_))));

    Ok(())
}

#[test]
fn element_layout_checked() -> Result<()> {
    let mut node = halc_node(HalcSafetyMode::OneLevelAllSafe);
    node.datapools[0].lists[1].elements[0].name = "DigitalInput_Renamed".into();

    let dir = tempfile::tempdir()?;
    let res = Codegen::new(&node, "Firmware", GenerateOptions::default())?.generate(dir.path());
    assert!(matches!(res, Err(CodegenError::Config(_))));

    Ok(())
}

#[test]
fn domain_without_channels_in_case_is_null() -> Result<()> {
    let mut halc = halc_config(HalcSafetyMode::TwoLevelWithDropping);
    for ch in &mut halc.domains[0].channels {
        ch.safety_relevant = true;
    }

    let node = halc_node_from(halc);
    let (_dir, files) = generate_into_tempdir(&node, "Firmware", GenerateOptions::default())?;

    let header = read_generated(&files, "hal_non_safe_configuration.h")?;
    assert!(header.contains("#define HAL_DIGITAL_INPUTS_NUMBER_OF_CHANNELS (0U)"));
    assert!(!header.contains("_CH_DI"));

    let source = read_generated(&files, "hal_non_safe_configuration.c")?;
    assert!(source.contains("const T_hal_digital_input * const gpt_hal_DigitalInputs = NULL;"));
    assert!(!source.contains("mat_DigitalInputs"));
    assert!(source.contains("gpt_hal_System = &mt_System;"));

    Ok(())
}
