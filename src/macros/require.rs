//! Transferring macros between modules.

use crate::errors::RequireError;
use crate::macros::ModuleMacros;
use crate::syntax::Reader;

/// Which macros `require` transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignments {
    /// Every macro in the source table.
    All,
    /// The source's declared exports, or its public names.
    Exports,
    /// Explicit `(name, alias)` pairs.
    Names(Vec<(String, String)>),
}

impl Assignments {
    /// `(name, name)` pairs for each name.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Assignments::Names(
            names
                .into_iter()
                .map(|n| {
                    let n = n.into();
                    (n.clone(), n)
                })
                .collect(),
        )
    }
}

/// Copies macro bindings from `source` into `target`.
///
/// Each alias is stored under `mangle(prefix + "." + alias)` when a prefix is
/// given, otherwise under `mangle(alias)`, with each table's own mangler. The
/// copied binding keeps its originating module. Returns whether anything was transferred: requiring a
/// module into itself, or bulk-requiring from an empty table, is a no-op.
pub fn require(
    source: &ModuleMacros,
    target: &mut ModuleMacros,
    assignments: &Assignments,
    prefix: Option<&str>,
) -> Result<bool, RequireError> {
    if source.module() == target.module() {
        return Ok(false);
    }

    let pairs: Vec<(String, String)> = match assignments {
        Assignments::All => source
            .names()
            .into_iter()
            .map(|n| (n.to_string(), n.to_string()))
            .collect(),
        Assignments::Exports => source
            .exported_names()
            .into_iter()
            .map(|n| (n.clone(), n))
            .collect(),
        Assignments::Names(pairs) => pairs.clone(),
    };

    if pairs.is_empty() {
        return Ok(false);
    }

    for (name, alias) in &pairs {
        let Some(binding) = source.get_mangled(&source.mangle_name(name)) else {
            return Err(RequireError::MissingName {
                name: name.clone(),
                module: source.module().to_string(),
            });
        };
        let target_name = match prefix {
            Some(prefix) => target.mangle_name(&format!("{prefix}.{alias}")),
            None => target.mangle_name(alias),
        };
        tracing::debug!(
            from = source.module(),
            into = target.module(),
            %target_name,
            "requiring macro"
        );
        let mut copied = binding.clone();
        copied.name = target_name;
        target.install_binding(copied);
    }

    Ok(true)
}

// ============================================================================
// READER MACROS
// ============================================================================

/// Which reader macros `require_reader` or `enable_readers` act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderAssignments {
    All,
    Names(Vec<String>),
}

impl ReaderAssignments {
    fn resolve(&self, table: &ModuleMacros) -> Vec<String> {
        match self {
            ReaderAssignments::All => table.reader_names().into_iter().map(str::to_string).collect(),
            ReaderAssignments::Names(names) => names.clone(),
        }
    }
}

/// Copies reader macros from `source` into `target` under their own tags.
///
/// Same return contract as [`require`]: `false` when `source` and `target`
/// are the same module.
pub fn require_reader(
    source: &ModuleMacros,
    target: &mut ModuleMacros,
    assignments: &ReaderAssignments,
) -> Result<bool, RequireError> {
    if source.module() == target.module() {
        return Ok(false);
    }

    for name in assignments.resolve(source) {
        let Some(reader_macro) = source.get_reader(&name) else {
            return Err(RequireError::MissingName {
                name,
                module: source.module().to_string(),
            });
        };
        tracing::debug!(
            from = source.module(),
            into = target.module(),
            reader_macro = %name,
            "requiring reader macro"
        );
        target.install_reader_binding(reader_macro.clone());
    }
    Ok(true)
}

/// Turns on `table`'s reader macros for the rest of `reader`'s input.
pub fn enable_readers(
    table: &ModuleMacros,
    reader: &mut Reader<'_>,
    names: &ReaderAssignments,
) -> Result<(), RequireError> {
    for name in names.resolve(table) {
        let Some(reader_macro) = table.get_reader(&name) else {
            return Err(RequireError::UndefinedReader { name });
        };
        reader.enable(reader_macro.clone());
    }
    Ok(())
}
