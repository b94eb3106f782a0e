use anyhow::Result;
use osy_codegen::psi::*;
use osy_codegen::{Codegen, CodegenError, GenerateOptions};
use osy_core::hash::crc16;
use osy_core::{DefinitionHash, HalcSafetyMode};
use testutil::{fixtures::*, util::*};

#[test]
fn one_image_per_safety_case() -> Result<()> {
    for (mode, expected) in [
        (HalcSafetyMode::OneLevelAllSafe, vec!["params_safe.syde_psi"]),
        (HalcSafetyMode::OneLevelAllNonSafe, vec!["params_non_safe.syde_psi"]),
        (
            HalcSafetyMode::TwoLevelWithDropping,
            vec!["params_safe.syde_psi", "params_non_safe.syde_psi"],
        ),
    ] {
        let node = halc_node(mode);
        let (_dir, files) = generate_into_tempdir(&node, "Params", GenerateOptions::default())?;
        assert_eq!(file_names(&files), expected, "{mode:?}");
    }

    Ok(())
}

#[test]
fn image_reads_back() -> Result<()> {
    let node = halc_node(HalcSafetyMode::TwoLevelWithoutDropping);
    let (_dir, files) = generate_into_tempdir(&node, "Params", GenerateOptions::default())?;

    let halc_hash = node.halc.as_ref().map(DefinitionHash::definition_hash);

    for (path, pool) in files.iter().zip(&node.datapools) {
        let image = ParamSetImage::read(&std::fs::read(path)?)?;

        assert_eq!(image, ParamSetImage::from_datapool(pool, halc_hash.unwrap_or_default())?);
        assert_eq!(image.datapool_name, pool.name);
        assert_eq!(image.datapool_hash, pool.definition_hash());
        assert_eq!(image.safety, pool.safety);
        assert_eq!(image.blocks.len(), 4);

        for (block, list) in image.blocks.iter().zip(&pool.lists) {
            assert_eq!(block.data.len(), list.nvm_size as usize);
            assert_eq!(block.data[..2], crc16(&block.data[2..]).to_be_bytes());
        }
    }

    Ok(())
}

#[test]
fn configuration_block_holds_dataset_values() -> Result<()> {
    let node = halc_node(HalcSafetyMode::TwoLevelWithDropping);
    let images = Codegen::new(&node, "Params", GenerateOptions::default())?.param_set_images()?;
    let (name, safe) = &images[0];
    assert_eq!(name, "params_safe.syde_psi");

    // safe channels DI0 (default 10) and DI2 (50), then System_Watchdog
    let config = &safe.blocks[0].data;
    assert_eq!(config[2..], [10, 0, 50, 0, 1]);

    // other lists stay zero
    assert!(safe.blocks[1..].iter().all(|b| b.data[2..].iter().all(|x| *x == 0)));

    let debounce = safe
        .entries
        .iter()
        .find(|e| e.name == "Configuration.DigitalInput_Debounce")
        .expect("debounce entry");
    assert_eq!(debounce.value.to_le_bytes(), [10, 0, 50, 0]);

    Ok(())
}

#[test]
fn corrupted_image_rejected() -> Result<()> {
    let node = halc_node(HalcSafetyMode::OneLevelAllSafe);
    let (_dir, files) = generate_into_tempdir(&node, "Params", GenerateOptions::default())?;

    let mut bytes = std::fs::read(&files[0])?;
    let last = bytes.len() - 5;
    bytes[last] ^= 0x01;
    assert!(ParamSetImage::read(&bytes).is_err());

    Ok(())
}

#[test]
fn configuration_needs_one_dataset() -> Result<()> {
    let mut node = halc_node(HalcSafetyMode::OneLevelAllSafe);
    let mut extra = node.datapools[0].lists[0].datasets[0].clone();
    extra.name = "Other".into();
    node.datapools[0].lists[0].datasets.push(extra);

    let res = Codegen::new(&node, "Params", GenerateOptions::default())?.param_set_images();
    assert!(matches!(res, Err(CodegenError::Config(_))));

    Ok(())
}

#[test]
fn short_block_crc_rejected() {
    let mut one = [7u8];
    assert!(matches!(insert_crc16(&mut one), Err(CodegenError::Config(_))));
    assert_eq!(one, [7]);
}
