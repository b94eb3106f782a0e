//! Generated file pairs and the boilerplate every generated file shares.

use std::path::{Path, PathBuf};

use indoc::formatdoc;

use crate::naming::*;
use crate::CodegenError;

/// Header and implementation file of one generated module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcePair {
    /// File name without extension, e.g. `comm_l2_can1`.
    pub basename: String,
    pub header: String,
    pub source: String,
}

impl SourcePair {
    pub fn header_name(&self) -> String {
        format!("{}.h", self.basename)
    }

    pub fn source_name(&self) -> String {
        format!("{}.c", self.basename)
    }

    /// Write both files into `dir` with CRLF line endings and return their
    /// paths, header first.
    ///
    /// A pair is never left half written: if the implementation file cannot
    /// be written, the header is removed again.
    pub fn save(&self, dir: &Path) -> Result<Vec<PathBuf>, CodegenError> {
        let h = dir.join(self.header_name());
        let c = dir.join(self.source_name());

        write_file(&h, crlf(&self.header))?;
        if let Err(e) = write_file(&c, crlf(&self.source)) {
            let _ = std::fs::remove_file(&h);
            return Err(e);
        }

        log::info!("Generated {} and {}", h.display(), c.display());
        Ok(vec![h, c])
    }
}

pub(crate) fn write_file(path: &Path, content: impl AsRef<[u8]>) -> Result<(), CodegenError> {
    std::fs::write(path, content).map_err(|source| {
        log::error!("Could not write {}: {source}", path.display());
        CodegenError::Write {
            path: path.into(),
            source,
        }
    })
}

/// Every line of `text` terminated by CRLF.
fn crlf(text: &str) -> String {
    text.lines().flat_map(|l| [l, "\r\n"]).collect()
}

/// Doxygen file comment at the top of every generated file.
pub(crate) fn file_header(file: &str, brief: &str, detail: &str, exporter: &str) -> String {
    formatdoc! {"
        {sep}
        /*!
           \\file
           \\brief       {brief} ({file})

           {detail}

           This file was generated by {exporter}.
           Manual changes will be overwritten on the next generation.
        */
        {sep}",
        sep = separator(),
    }
}

/// Include guard name of a header, e.g. `COMM_L2_CAN1H`.
pub(crate) fn guard_name(basename: &str) -> String {
    format!("{}H", basename.to_uppercase())
}

pub(crate) fn extern_c_open() -> String {
    formatdoc! {"
        #ifdef __cplusplus
        extern \"C\" {{
        #endif"
    }
}

pub(crate) fn extern_c_close() -> String {
    formatdoc! {"
        #ifdef __cplusplus
        }} //end of extern \"C\"
        #endif"
    }
}

/// Name of the project id macro of a module.
///
/// The header defines it, the implementation file expands it. A header
/// generated for a different definition does not define the macro the
/// implementation expands, which breaks the build instead of the firmware.
pub(crate) fn project_id_macro(basename: &str, hash: u32) -> String {
    format!("{}_PROJECT_ID_{hash}", basename.to_uppercase())
}

/// Definition of the project id macro, expanding to an empty function with
/// a unique name.
pub(crate) fn project_id_define(basename: &str, hash: u32) -> String {
    format!(
        "#define {} void {}_project_id_{hash}(void) {{}}",
        project_id_macro(basename, hash),
        basename.to_lowercase()
    )
}

/// Reference to a firmware definition version; a mismatch names a type that
/// does not exist.
pub(crate) fn version_guard(version_macro: &str, version: u16, hash: u32) -> String {
    formatdoc! {"
        #if {version_macro} != 0x{version:04X}U
        static T_osy_non_existing_type_{hash} mt_Variable;
        #endif"
    }
}

/// Header file frame: guard, includes, extern "C" and `body`.
pub(crate) fn header_file(top: &str, basename: &str, includes: &[String], body: &str) -> String {
    let includes = includes
        .iter()
        .map(|i| format!("#include \"{i}\""))
        .collect::<Vec<_>>()
        .join("\n");

    formatdoc! {"
        {top}
        #ifndef {guard}
        #define {guard}

        {includes_section}
        {includes}

        {extern_open}

        {body}

        {extern_close}

        #endif
        ",
        guard = guard_name(basename),
        includes_section = section("Includes"),
        extern_open = extern_c_open(),
        body = body.trim(),
        extern_close = extern_c_close(),
    }
}

/// Implementation file frame: own header include and `body`.
pub(crate) fn source_file(top: &str, basename: &str, body: &str) -> String {
    formatdoc! {"
        {top}

        {includes_section}
        #include \"{basename}.h\"

        {body}
        ",
        includes_section = section("Includes"),
        body = body.trim(),
    }
}
