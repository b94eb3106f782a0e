use anyhow::Result;
use osy_codegen::{Codegen, GenerateOptions, Status};
use osy_core::DefinitionHash;
use testutil::{fixtures::*, util::*};

#[test]
fn nvm_pool_generates_pool_and_init() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let node = nvm_node();
    let (_dir, files) = generate_into_tempdir(&node, "Main", GenerateOptions::default())?;

    assert_eq!(
        file_names(&files),
        [
            "osy_init.h",
            "osy_init.c",
            "settings_data_pool.h",
            "settings_data_pool.c"
        ]
    );

    let source = read_generated(&files, "settings_data_pool.c")?;
    let hash = format!("0x{:08X}UL", node.datapools[0].definition_hash());
    assert!(source.contains(&hash), "descriptor lacks definition hash {hash}");

    let header = read_generated(&files, "settings_data_pool.h")?;
    assert!(header.contains("u8_A"));
    assert!(header.contains("u16_B"));

    Ok(())
}

#[test]
fn status_of_successful_run() -> Result<()> {
    let node = nvm_node();
    let dir = tempfile::tempdir()?;

    let res = Codegen::new(&node, "Main", GenerateOptions::default())?.generate(dir.path());
    assert_eq!(Status::of(&res), Status::Success);
    assert_eq!(res?.len(), 4);

    Ok(())
}

/// The project id macro each header defines is expanded by its
/// implementation file.
#[test]
fn headers_pair_with_implementations() -> Result<()> {
    let nodes = [
        (nvm_node(), "Main"),
        (com_node(osy_core::CanProtocolKind::Eces), "Main"),
        (canopen_node(), "Main"),
        (halc_node(osy_core::HalcSafetyMode::TwoLevelWithDropping), "Firmware"),
    ];

    for (node, app) in &nodes {
        let (_dir, files) = generate_into_tempdir(node, app, GenerateOptions::default())?;

        for h in files.iter().filter(|f| f.extension().is_some_and(|e| e == "h")) {
            let header = std::fs::read_to_string(h)?;
            let source = std::fs::read_to_string(h.with_extension("c"))?;

            let define = header
                .lines()
                .find(|l| l.starts_with("#define") && l.contains("_PROJECT_ID_"))
                .expect("header defines a project id");
            let macro_name = define.split_whitespace().nth(1).expect("macro name");

            assert!(
                source.lines().any(|l| l.trim() == macro_name),
                "{} does not expand {macro_name}",
                h.with_extension("c").display()
            );
        }
    }

    Ok(())
}

#[test]
fn unknown_application_is_config_error() {
    let node = nvm_node();
    let res = Codegen::new(&node, "Missing", GenerateOptions::default());
    assert_eq!(Status::of(&res).code(), 2);
}

#[test]
fn invalid_node_fails_before_writing() -> Result<()> {
    let mut node = nvm_node();
    node.datapools[0].lists[0].datasets[0].values.pop();

    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    let res = Codegen::new(&node, "Main", GenerateOptions::default())?.generate(&out);

    assert_eq!(Status::of(&res), Status::ConfigError);
    assert!(!out.exists());

    Ok(())
}

#[test]
fn composed_node_generates() -> Result<()> {
    let node = osy_compose::compose_entry_str(indoc::indoc! {"
        name: Ecu
        applications:
          - name: Main
            kind: programmable
            code_format_version: 4
        datapools:
          - name: Params
            kind: NVM
            owner: 0
            lists:
              - name: Config
                elements:
                  - name: A
                    value: { type: u8, value: 5 }
                    min: { type: u8, value: 0 }
                    max: { type: u8, value: 10 }
    "})?;

    let (_dir, files) = generate_into_tempdir(&node, "Main", GenerateOptions::default())?;
    let header = read_generated(&files, "params_data_pool.h")?;
    assert!(header.contains("#define PARAMS_CONFIG_INDEX_A (0U)"));

    let init = read_generated(&files, "osy_init.c")?;
    assert!(init.contains("&gt_params_DataPool,"));
    assert!(init.contains("OSY_DPA_LINKAGE_LOCAL, ///< Params"));

    Ok(())
}
