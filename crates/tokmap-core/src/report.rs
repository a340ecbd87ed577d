//! Summary reports over a finished analysis.
//!
//! A [`Report`] lists the registered files, the identifiers found by
//! scanning file contents for class starts, the dependency edges, and the
//! diagnostics. Everything is ordered deterministically (files by path,
//! identifiers by first occurrence in that file order) so reports can be
//! compared as JSON.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::analysis::Analysis;
use crate::diag::Diagnostic;
use crate::eclass::EClassId;
use crate::error::TokmapResult;
use crate::file::FileId;
use crate::text;
use crate::token::Fragment;

/// File contents keyed by file id. Files without contents are listed but
/// contribute no identifiers.
pub type Sources = HashMap<FileId, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub id: FileId,
    pub path: String,
    pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierInfo {
    pub name: String,
    pub class: EClassId,
    pub len: u64,
    pub size: usize,
    pub readonly: bool,
    /// Only one occurrence was ever seen.
    pub unused: bool,
    /// Paths of the files the identifier occurs in, sorted.
    pub files: Vec<String>,
    /// Short names of the attributes set on the class.
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyInfo {
    pub definer: String,
    pub referencer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub files: usize,
    pub readonly_files: usize,
    pub writable_files: usize,
    pub classes: usize,
    pub identifiers: usize,
    pub unused_identifiers: usize,
    pub dependencies: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub files: Vec<FileInfo>,
    pub identifiers: Vec<IdentifierInfo>,
    pub dependencies: Vec<DependencyInfo>,
    pub diagnostics: Vec<Diagnostic>,
    pub counts: ReportCounts,
    pub aborted: bool,
}

impl Report {
    pub fn build(analysis: &Analysis, sources: &Sources) -> TokmapResult<Report> {
        let files = analysis.files();
        let order = files.all_files_sorted_by_path();

        let mut file_infos = Vec::with_capacity(order.len());
        for &id in &order {
            file_infos.push(FileInfo {
                id,
                path: path_string(analysis, id)?,
                readonly: files.is_readonly(id)?,
            });
        }

        let mut identifiers = Vec::new();
        let mut seen = BTreeSet::new();
        for &file in &order {
            let Some(content) = sources.get(&file) else {
                continue;
            };
            for (position, class_id) in analysis.classes().starts_in(file) {
                if seen.contains(&class_id) {
                    continue;
                }
                let class = analysis.class(class_id)?;
                let Some(name) = text::fragment_text(content, &Fragment::new(position, class.len()))
                else {
                    tracing::debug!(%position, class = %class_id, "class run outside file contents");
                    continue;
                };
                seen.insert(class_id);
                identifiers.push(identifier_info(analysis, class_id, name)?);
            }
        }

        let mut dependencies = Vec::with_capacity(analysis.dependencies().len());
        for edge in analysis.dependencies().edges() {
            dependencies.push(DependencyInfo {
                definer: path_string(analysis, edge.definer)?,
                referencer: path_string(analysis, edge.referencer)?,
            });
        }

        let readonly_files = file_infos.iter().filter(|f| f.readonly).count();
        let counts = ReportCounts {
            files: file_infos.len(),
            readonly_files,
            writable_files: file_infos.len() - readonly_files,
            classes: analysis.classes().num_classes(),
            identifiers: identifiers.len(),
            unused_identifiers: identifiers.iter().filter(|i| i.unused).count(),
            dependencies: dependencies.len(),
            errors: analysis.diagnostics().num_errors(),
            warnings: analysis.diagnostics().num_warnings(),
        };

        Ok(Report {
            files: file_infos,
            identifiers,
            dependencies,
            diagnostics: analysis.diagnostics().entries().to_vec(),
            counts,
            aborted: analysis.is_aborted(),
        })
    }

    /// Files not marked read-only, in path order.
    pub fn writable_files(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.iter().filter(|f| !f.readonly)
    }

    pub fn readonly_files(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.iter().filter(|f| f.readonly)
    }

    pub fn identifier(&self, name: &str) -> Option<&IdentifierInfo> {
        self.identifiers.iter().find(|i| i.name == name)
    }
}

fn identifier_info(analysis: &Analysis, id: EClassId, name: String) -> TokmapResult<IdentifierInfo> {
    let class = analysis.class(id)?;
    let mut files = Vec::new();
    for file in analysis.sorted_files(id)? {
        files.push(path_string(analysis, file)?);
    }
    let mut attributes = Vec::new();
    for attr in class.attributes().iter() {
        attributes.push(analysis.attributes().attribute_short_name(attr)?.to_string());
    }
    if class.is_readonly() {
        attributes.insert(0, "ro".to_string());
    }
    Ok(IdentifierInfo {
        name,
        class: id,
        len: class.len(),
        size: class.size(),
        readonly: class.is_readonly(),
        unused: class.is_unused(),
        files,
        attributes,
    })
}

fn path_string(analysis: &Analysis, id: FileId) -> TokmapResult<String> {
    Ok(analysis.path_of(id)?.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Attribute;
    use crate::position::Position;
    use crate::token::Token;

    fn two_files() -> (Analysis, Sources, FileId, FileId) {
        let mut analysis = Analysis::new();
        let a = analysis.intern_file("b/use.c").unwrap();
        let h = analysis.intern_file("a/defs.h").unwrap();
        let mut sources = Sources::new();
        sources.insert(a, b"int y = LIMIT;".to_vec());
        sources.insert(h, b"#define LIMIT 10".to_vec());
        (analysis, sources, a, h)
    }

    #[test]
    fn files_are_listed_by_path() {
        let (mut analysis, sources, a, h) = two_files();
        analysis.set_readonly(h, true).unwrap();
        let report = Report::build(&analysis, &sources).unwrap();
        let paths: Vec<_> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a/defs.h", "b/use.c"]);
        assert_eq!(report.readonly_files().next().unwrap().id, h);
        assert_eq!(report.writable_files().next().unwrap().id, a);
        assert_eq!(report.counts.readonly_files, 1);
    }

    #[test]
    fn identifiers_are_scanned_from_class_starts() {
        let (mut analysis, sources, a, h) = two_files();
        let def = Token::identifier("LIMIT", Position::new(h, 8)).unwrap();
        let refr = Token::identifier("LIMIT", Position::new(a, 8)).unwrap();
        analysis.set_token_attribute(&def, Attribute::Macro).unwrap();
        analysis.unify(&def, &refr).unwrap();
        let lone = Token::identifier("y", Position::new(a, 4)).unwrap();
        analysis.constituents(&lone).unwrap();

        let report = Report::build(&analysis, &sources).unwrap();
        let limit = report.identifier("LIMIT").unwrap();
        assert_eq!(limit.size, 2);
        assert!(!limit.unused);
        assert_eq!(limit.files, vec!["a/defs.h", "b/use.c"]);
        assert_eq!(limit.attributes, vec!["macro"]);
        assert!(report.identifier("y").unwrap().unused);
        assert_eq!(report.counts.identifiers, 2);
        assert_eq!(report.counts.unused_identifiers, 1);
        assert_eq!(
            report.dependencies,
            vec![DependencyInfo {
                definer: "a/defs.h".to_string(),
                referencer: "b/use.c".to_string(),
            }]
        );
    }

    #[test]
    fn report_serializes_to_json() {
        let (analysis, sources, _, _) = two_files();
        let report = Report::build(&analysis, &sources).unwrap();
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["counts"]["files"], 2);
        assert_eq!(json["aborted"], false);
        assert!(json["identifiers"].as_array().unwrap().is_empty());
    }
}
