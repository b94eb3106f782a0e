//! C source and parameter set image generation for openSYDE nodes.
//!
//! [`Codegen`] binds a node to one of its applications and a code format
//! version, then emits everything that application needs with
//! [`Codegen::generate`].

use std::path::{Path, PathBuf};

use clap::Parser;
use log::debug;
use osy_core::*;
use textwrap::indent;

mod error;
pub use error::*;

mod naming;

mod text;
pub use text::SourcePair;

pub mod datapool;
pub use datapool::Linkage;

pub mod comm;
pub mod canopen;
pub mod halc;
pub mod psi;
mod osy_init;

/// Newest code format version the generator can emit.
pub const HIGHEST_KNOWN_CODE_FORMAT_VERSION: u16 = LATEST_CODE_FORMAT_VERSION;

/// Floating point support of the target, deciding how scaling factors and
/// offsets are emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ScalingSupport {
    #[default]
    Float32,
    Float64,
    /// No floating point; scaling is left to the tool side.
    None,
}

impl ScalingSupport {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Float32 => 0,
            Self::Float64 => 1,
            Self::None => 2,
        }
    }
}

#[derive(Clone, Debug, Parser)]
pub struct Args {
    /// Node description file
    pub in_file: String,

    /// Application of the node to generate for
    pub application: String,

    /// Directory the generated files are written to
    pub out_dir: PathBuf,

    /// Code format version, defaults to the application's
    #[arg(long)]
    pub format_version: Option<u16>,

    #[arg(long, value_enum, default_value_t)]
    pub scaling: ScalingSupport,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Overrides the application's code format version.
    pub format_version: Option<u16>,
    pub scaling: ScalingSupport,
    /// Tool name and version written into every file header.
    pub exporter: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            format_version: None,
            scaling: ScalingSupport::default(),
            exporter: format!("{} {}", clap::crate_name!(), clap::crate_version!()),
        }
    }
}

impl From<&Args> for GenerateOptions {
    fn from(args: &Args) -> Self {
        Self {
            format_version: args.format_version,
            scaling: args.scaling,
            ..Default::default()
        }
    }
}

trait Indent {
    fn indent(&self, n: usize) -> String;
}

impl Indent for String {
    fn indent(&self, n: usize) -> String {
        indent(self, &" ".repeat(n))
    }
}

impl Indent for &str {
    fn indent(&self, n: usize) -> String {
        indent(self, &" ".repeat(n))
    }
}

/// Steps of one generation run, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    CheckPrerequisites,
    CreateFolder,
    EmitOsyInit,
    EmitDataPools,
    EmitCommStack,
    EmitHalConfig,
    EmitParamSetImages,
}

impl Stage {
    pub fn sequence(kind: ApplicationKind) -> &'static [Stage] {
        match kind {
            ApplicationKind::Programmable => &[
                Self::CheckPrerequisites,
                Self::CreateFolder,
                Self::EmitOsyInit,
                Self::EmitDataPools,
                Self::EmitCommStack,
                Self::EmitHalConfig,
            ],
            ApplicationKind::ParameterSet => &[
                Self::CheckPrerequisites,
                Self::CreateFolder,
                Self::EmitParamSetImages,
            ],
        }
    }
}

/// How `app` reaches `pool` in code format `version`, or `None` if the pool
/// is not part of the application's generated code.
pub fn resolve_linkage(
    node: &Node,
    app: ApplicationIndex,
    pool: &DataPool,
    version: u16,
) -> Option<Linkage> {
    if pool.owner == Some(app) {
        Some(Linkage::Local)
    } else if pool.public && version >= 4 {
        Some(Linkage::RemotePublic)
    } else if node.is_diagnostic_application(app) {
        Some(Linkage::Remote)
    } else {
        None
    }
}

pub struct Codegen<'n> {
    node: &'n Node,
    app_index: ApplicationIndex,
    app: &'n Application,
    version: u16,
    opts: GenerateOptions,
    /// Data pools in the application's generated code, in node order.
    pools: Vec<(DataPoolIndex, Linkage)>,
}

impl<'n> Codegen<'n> {
    pub fn new(node: &'n Node, app_name: &str, opts: GenerateOptions) -> Result<Self, CodegenError> {
        let (app_index, app) = node.application_by_name(app_name).ok_or_else(|| {
            CodegenError::config(format!(
                "Application `{app_name}` not found in node `{}`.",
                node.name
            ))
        })?;

        let version = opts.format_version.unwrap_or(app.code_format_version);
        if version == 0 || version > HIGHEST_KNOWN_CODE_FORMAT_VERSION {
            return Err(CodegenError::unsupported(format!(
                "Code format version {version} of application `{app_name}` is not supported \
                 (1 to {HIGHEST_KNOWN_CODE_FORMAT_VERSION})."
            )));
        }

        let pools = node
            .iter_datapools()
            .filter_map(|(idx, pool)| {
                resolve_linkage(node, app_index, pool, version).map(|l| (idx, l))
            })
            .collect();

        Ok(Self {
            node,
            app_index,
            app,
            version,
            opts,
            pools,
        })
    }

    pub fn app(&self) -> &'n Application {
        self.app
    }

    /// Code format version of this run.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Data pools in the generated code, with their linkage.
    pub fn visible_datapools(&self) -> &[(DataPoolIndex, Linkage)] {
        &self.pools
    }

    /// Protocols whose COM data pool this application owns.
    pub(crate) fn local_protocols(&self) -> Vec<(ProtocolIndex, &'n CanProtocol)> {
        self.node
            .iter_protocols()
            .filter(|(_, p)| {
                self.pools
                    .iter()
                    .any(|(idx, l)| *idx == p.datapool && *l == Linkage::Local)
            })
            .collect()
    }

    /// Interfaces a protocol is active on.
    pub(crate) fn comm_interfaces(&self, proto: &CanProtocol) -> Vec<usize> {
        proto
            .containers
            .iter()
            .enumerate()
            .filter(|(_, c)| c.active)
            .map(|(i, _)| i)
            .collect()
    }

    /// Run all stages for this application and return the written files.
    ///
    /// The first failing stage ends the run; files written by earlier stages
    /// are left in place.
    pub fn generate(&self, dir: &Path) -> Result<Vec<PathBuf>, CodegenError> {
        let mut written = Vec::new();

        for stage in Stage::sequence(self.app.kind) {
            debug!("`{}`: {stage:?}", self.app.name);

            match stage {
                Stage::CheckPrerequisites => self.check_prerequisites()?,
                Stage::CreateFolder => {
                    std::fs::create_dir_all(dir).map_err(|source| {
                        log::error!("Could not create {}: {source}", dir.display());
                        CodegenError::Write {
                            path: dir.into(),
                            source,
                        }
                    })?;
                }
                Stage::EmitOsyInit => written.extend(self.osy_init_files()?.save(dir)?),
                Stage::EmitDataPools => {
                    for (i, (idx, linkage)) in self.pools.iter().enumerate() {
                        written.extend(self.emit_datapool(i, *idx, *linkage)?.save(dir)?);
                    }
                }
                Stage::EmitCommStack => {
                    for (idx, proto) in self.local_protocols() {
                        for ifc in self.comm_interfaces(proto) {
                            written.extend(self.comm_files(idx, ifc)?.save(dir)?);
                        }
                    }

                    let managers = self.manager_interfaces();
                    for ifc in &managers {
                        written.extend(self.canopen_manager_files(*ifc)?.save(dir)?);
                    }
                    if !managers.is_empty() {
                        written.extend(self.canopen_init_files(&managers)?.save(dir)?);
                    }
                }
                Stage::EmitHalConfig => {
                    for (case, pool) in self.hal_pools()? {
                        written.extend(self.hal_files(case, pool)?.save(dir)?);
                    }
                }
                Stage::EmitParamSetImages => written.extend(self.psi_files(dir)?),
            }
        }

        debug!("`{}`: generated {} files", self.app.name, written.len());
        Ok(written)
    }

    /// Files of data pool `idx`; COM pools are emitted with their element
    /// names qualified by message.
    fn emit_datapool(
        &self,
        position: usize,
        idx: DataPoolIndex,
        linkage: Linkage,
    ) -> Result<SourcePair, CodegenError> {
        let pool = self
            .node
            .datapool(idx)
            .ok_or_else(|| CodegenError::config(format!("Data pool {idx} does not exist.")))?;

        match self.node.protocols.iter().find(|p| p.datapool == idx) {
            Some(proto) if pool.kind == DataPoolKind::Com => {
                let qualified = comm::qualify_com_pool(pool, proto);
                self.datapool_files(position, &qualified, pool, linkage)
            }
            _ => self.datapool_files(position, pool, pool, linkage),
        }
    }

    /// Everything that can be checked before the first file is written.
    fn check_prerequisites(&self) -> Result<(), CodegenError> {
        self.node
            .validate()
            .map_err(|e| CodegenError::config(format!("Node `{}`: {e}", self.node.name)))?;

        match self.app.kind {
            ApplicationKind::Programmable => {
                if !self.hal_pools()?.is_empty() && self.version < 5 {
                    return Err(CodegenError::unsupported(format!(
                        "Application `{}` owns HALC data pools, which need code format version 5 or newer, got {}.",
                        self.app.name, self.version
                    )));
                }

                if !self.manager_interfaces().is_empty() && self.version < 6 {
                    return Err(CodegenError::unsupported(format!(
                        "Application `{}` runs a CANopen manager, which needs code format version 6 or newer, got {}.",
                        self.app.name, self.version
                    )));
                }
            }
            ApplicationKind::ParameterSet => {
                self.param_set_images()?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Node {
        let mut node = Node::new("Ecu");
        node.applications = vec![
            Application::programmable("Main"),
            Application::programmable("Diag"),
        ];

        let mut own = DataPool::new("Own", DataPoolKind::Diag);
        own.owner = Some(ApplicationIndex::new(0));
        let mut public = DataPool::new("Shared", DataPoolKind::Diag);
        public.owner = Some(ApplicationIndex::new(1));
        public.public = true;
        let mut private = DataPool::new("Private", DataPoolKind::Diag);
        private.owner = Some(ApplicationIndex::new(1));

        node.datapools = vec![own, public, private];
        node
    }

    #[test]
    fn linkage_precedence() {
        let node = node();
        let main = ApplicationIndex::new(0);
        let link = |i: usize, v| resolve_linkage(&node, main, &node.datapools[i], v);

        assert_eq!(link(0, 4), Some(Linkage::Local));
        assert_eq!(link(1, 4), Some(Linkage::RemotePublic));
        assert_eq!(link(1, 3), None);
        assert_eq!(link(2, 4), None);

        let mut diag = node.clone();
        diag.diagnostic_application = Some(main);
        assert_eq!(
            resolve_linkage(&diag, main, &diag.datapools[1], 3),
            Some(Linkage::Remote)
        );
        assert_eq!(
            resolve_linkage(&diag, main, &diag.datapools[2], 6),
            Some(Linkage::Remote)
        );
    }

    #[test]
    fn version_bounds() {
        let node = node();
        let with = |v| GenerateOptions {
            format_version: Some(v),
            ..Default::default()
        };

        assert!(matches!(
            Codegen::new(&node, "Main", with(0)),
            Err(CodegenError::Unsupported(_))
        ));
        assert!(matches!(
            Codegen::new(&node, "Main", with(HIGHEST_KNOWN_CODE_FORMAT_VERSION + 1)),
            Err(CodegenError::Unsupported(_))
        ));
        assert_eq!(Codegen::new(&node, "Main", with(1)).unwrap().version(), 1);
        assert!(matches!(
            Codegen::new(&node, "Nope", with(1)),
            Err(CodegenError::Config(_))
        ));
    }

    #[test]
    fn version_defaults_to_application() {
        let mut node = node();
        node.applications[0].code_format_version = 3;

        let cg = Codegen::new(&node, "Main", GenerateOptions::default()).unwrap();
        assert_eq!(cg.version(), 3);
        assert_eq!(cg.visible_datapools(), [(DataPoolIndex::new(0), Linkage::Local)]);
    }

    #[test]
    fn stage_sequences() {
        assert_eq!(
            Stage::sequence(ApplicationKind::ParameterSet),
            [
                Stage::CheckPrerequisites,
                Stage::CreateFolder,
                Stage::EmitParamSetImages
            ]
        );
        assert_eq!(
            Stage::sequence(ApplicationKind::Programmable)[0],
            Stage::CheckPrerequisites
        );
    }
}
