//! Application initialization tables (`osy_init.h/.c`).

use indoc::formatdoc;
use osy_core::hash::DEFINITION_HASH;
use osy_core::*;

use crate::comm::{comm_basename, protocol_config_ident};
use crate::datapool::DataPoolCodegen;
use crate::naming::*;
use crate::text::*;
use crate::{Codegen, CodegenError, Indent};

const BASENAME: &str = "osy_init";

/// Owner entry of a pool that belongs to no application.
const NO_OWNER: u8 = 0xFF;

impl<'n> Codegen<'n> {
    /// Generate the tables the firmware walks at startup to register data
    /// pools and protocol configurations.
    pub fn osy_init_files(&self) -> Result<SourcePair, CodegenError> {
        let mut pools = Vec::new();
        for (idx, linkage) in &self.pools {
            let pool = self
                .node
                .datapool(*idx)
                .ok_or_else(|| CodegenError::config(format!("Data pool {idx} does not exist.")))?;
            pools.push((pool, *linkage));
        }

        let protocols: Vec<_> = self
            .local_protocols()
            .into_iter()
            .flat_map(|(_, p)| self.comm_interfaces(p).into_iter().map(move |i| (p.kind, i)))
            .collect();

        let hosts_diagnostics = self.node.is_diagnostic_application(self.app_index);
        let hosts_canopen = !self.manager_interfaces().is_empty();

        let mut h = DEFINITION_HASH.digest();
        for (pool, linkage) in &pools {
            pool.hash_into(&mut h);
            h.update(&[linkage.tag()]);
        }
        for (kind, ifc) in &protocols {
            h.update(comm_basename(*kind, *ifc).as_bytes());
        }
        h.update(&[u8::from(hosts_diagnostics), u8::from(hosts_canopen)]);
        h.update(&self.version.to_le_bytes());
        let project_hash = h.finalize();

        let mut includes = vec!["stwtypes.h".to_string(), "osy_dpa_data_pool.h".into()];
        includes.extend(pools.iter().map(|(p, _)| format!("{}.h", p.basename())));
        includes.extend(
            protocols
                .iter()
                .map(|(k, i)| format!("{}.h", comm_basename(*k, *i))),
        );

        let mut header_body = formatdoc! {"
            {defines}
            {project_id}

            #define OSY_INIT_NUMBER_OF_DATA_POOLS ({n_pools}U)
            #define OSY_INIT_NUMBER_OF_PROTOCOLS ({n_protocols}U)
            #define OSY_INIT_HOSTS_DIAGNOSTICS ({diag}U)
            #define OSY_INIT_HOSTS_CANOPEN_MANAGER ({canopen}U)

            {globals}
            ",
            defines = section("Defines"),
            project_id = project_id_define(BASENAME, project_hash),
            n_pools = pools.len(),
            n_protocols = protocols.len(),
            diag = u8::from(hosts_diagnostics),
            canopen = u8::from(hosts_canopen),
            globals = section("Global Variables"),
        };

        let mut source_body = formatdoc! {"
            {defines}
            {project_id}

            {globals}
            ",
            defines = section("Defines"),
            project_id = project_id_macro(BASENAME, project_hash),
            globals = section("Global Variables"),
        };

        if !pools.is_empty() {
            header_body += "extern const T_osy_dpa_data_pool * const gapt_osy_init_DataPools[OSY_INIT_NUMBER_OF_DATA_POOLS];\n";
            header_body += "extern const uint8 gau8_osy_init_DataPoolOwners[OSY_INIT_NUMBER_OF_DATA_POOLS];\n";

            let refs = pools
                .iter()
                .map(|(p, _)| format!("&{},", p.descriptor_ident()))
                .collect::<Vec<_>>()
                .join("\n");

            let owners = pools
                .iter()
                .map(|(p, _)| Ok(format!("{}U, ///< {}", owner_entry(p.owner)?, p.name)))
                .collect::<Result<Vec<_>, CodegenError>>()?
                .join("\n");

            source_body += &formatdoc! {"
                const T_osy_dpa_data_pool * const gapt_osy_init_DataPools[OSY_INIT_NUMBER_OF_DATA_POOLS] =
                {{
                {refs}
                }};

                const uint8 gau8_osy_init_DataPoolOwners[OSY_INIT_NUMBER_OF_DATA_POOLS] =
                {{
                {owners}
                }};

                ",
                refs = refs.indent(3),
                owners = owners.indent(3),
            };

            if self.version >= 4 {
                header_body += "extern const uint8 gau8_osy_init_DataPoolLinkage[OSY_INIT_NUMBER_OF_DATA_POOLS];\n";

                let linkage = pools
                    .iter()
                    .map(|(p, l)| format!("{}, ///< {}", l.c_constant(), p.name))
                    .collect::<Vec<_>>()
                    .join("\n");

                source_body += &formatdoc! {"
                    const uint8 gau8_osy_init_DataPoolLinkage[OSY_INIT_NUMBER_OF_DATA_POOLS] =
                    {{
                    {linkage}
                    }};

                    ",
                    linkage = linkage.indent(3),
                };
            }
        }

        if !protocols.is_empty() {
            header_body += "extern const T_osy_com_protocol_configuration * const gapt_osy_init_ProtocolConfigurations[OSY_INIT_NUMBER_OF_PROTOCOLS];\n";

            let refs = protocols
                .iter()
                .map(|(k, i)| format!("&{},", protocol_config_ident(*k, *i)))
                .collect::<Vec<_>>()
                .join("\n");

            source_body += &formatdoc! {"
                const T_osy_com_protocol_configuration * const gapt_osy_init_ProtocolConfigurations[OSY_INIT_NUMBER_OF_PROTOCOLS] =
                {{
                {refs}
                }};

                ",
                refs = refs.indent(3),
            };
        }

        header_body += &formatdoc! {"

            {functions}
            extern sint32 osy_init_InitDataPools(void);
            extern sint32 osy_init_InitProtocols(void);
            ",
            functions = section("Function Prototypes"),
        };

        source_body += &format!("{}\n", section("Implementation"));
        source_body += &init_function(
            "osy_init_InitDataPools",
            "OSY_INIT_NUMBER_OF_DATA_POOLS",
            "osy_dpa_init_data_pool(u8_Index, gapt_osy_init_DataPools[u8_Index])",
            !pools.is_empty(),
        );
        source_body += "\n";
        source_body += &init_function(
            "osy_init_InitProtocols",
            "OSY_INIT_NUMBER_OF_PROTOCOLS",
            "osy_com_init_protocol(gapt_osy_init_ProtocolConfigurations[u8_Index])",
            !protocols.is_empty(),
        );

        let detail = format!("Initialization tables of application `{}`.", self.app().name);
        let brief = "openSYDE initialization";

        Ok(SourcePair {
            basename: BASENAME.into(),
            header: header_file(
                &file_header(&format!("{BASENAME}.h"), brief, &detail, &self.opts.exporter),
                BASENAME,
                &includes,
                &header_body,
            ),
            source: source_file(
                &file_header(&format!("{BASENAME}.c"), brief, &detail, &self.opts.exporter),
                BASENAME,
                &source_body,
            ),
        })
    }
}

/// Function calling `call` once per table entry; without entries it only
/// reports success.
fn init_function(name: &str, count: &str, call: &str, has_entries: bool) -> String {
    if !has_entries {
        return formatdoc! {"
            sint32 {name}(void)
            {{
               return C_NO_ERR;
            }}
            "
        };
    }

    formatdoc! {"
        sint32 {name}(void)
        {{
           sint32 s32_Return = C_NO_ERR;
           uint8 u8_Index;

           for (u8_Index = 0U; (u8_Index < {count}) && (s32_Return == C_NO_ERR); u8_Index++)
           {{
              s32_Return = {call};
           }}
           return s32_Return;
        }}
        "
    }
}

/// Owner table entry; 0xFF is reserved for pools without owner.
fn owner_entry(owner: Option<ApplicationIndex>) -> Result<u8, CodegenError> {
    let Some(owner) = owner else {
        return Ok(NO_OWNER);
    };

    u8::try_from(owner.raw())
        .ok()
        .filter(|&o| o != NO_OWNER)
        .ok_or(CodegenError::Range("Application", owner.raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_init_function_has_no_loop() {
        let f = init_function("f", "N", "g()", false);
        assert!(!f.contains("for"));
        assert!(f.contains("return C_NO_ERR;"));

        let f = init_function("f", "N", "g(u8_Index)", true);
        assert!(f.contains("(u8_Index < N)"));
        assert!(f.contains("s32_Return = g(u8_Index);"));
    }

    #[test]
    fn owner_entries() {
        assert_eq!(owner_entry(None).unwrap(), NO_OWNER);
        assert_eq!(owner_entry(Some(ApplicationIndex::new(254))).unwrap(), 254);
        assert!(matches!(
            owner_entry(Some(ApplicationIndex::new(255))),
            Err(CodegenError::Range("Application", 255))
        ));
        assert!(matches!(
            owner_entry(Some(ApplicationIndex::new(300))),
            Err(CodegenError::Range("Application", 300))
        ));
    }
}
