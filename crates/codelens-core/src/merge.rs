//! Reconciles per-chunk analyses into one record per file.
//!
//! A file larger than one chunk is analyzed piecemeal, so the model reports
//! the same file (and often the same class) several times. The merge rules:
//!
//! | Field | Rule |
//! |-------|------|
//! | `description`, `lines_of_code` | first chunk that mentions the file wins |
//! | `key_imports` | set union, emitted sorted |
//! | `classes` | one entry per class name, in first-seen order |
//! | class `annotations` | set union, first-seen order |
//! | class `methods` | concatenated in encounter order, never de-duplicated |
//!
//! Files are emitted in the order their name first appears in the input,
//! even when chunks of different files interleave.

use std::collections::{BTreeSet, HashMap};

use crate::models::{ChunkAnalysis, ClassRecord, MergedFileRecord};

/// Merge chunk analyses, in processing order, into one [`MergedFileRecord`]
/// per distinct `filename`.
///
/// # Example
///
/// ```rust
/// use codelens_core::merge::merge_results_by_filename;
/// use codelens_core::models::ChunkAnalysis;
///
/// let first = ChunkAnalysis { filename: "a.py".into(), description: "d1".into(), ..Default::default() };
/// let second = ChunkAnalysis { filename: "a.py".into(), description: "d2".into(), ..Default::default() };
/// let merged = merge_results_by_filename(vec![first, second]);
/// assert_eq!(merged.len(), 1);
/// assert_eq!(merged[0].description, "d1");
/// ```
pub fn merge_results_by_filename<I>(results: I) -> Vec<MergedFileRecord>
where
    I: IntoIterator<Item = ChunkAnalysis>,
{
    let mut files: Vec<FileAccumulator> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for analysis in results {
        let idx = match by_name.get(&analysis.filename) {
            Some(&idx) => idx,
            None => {
                by_name.insert(analysis.filename.clone(), files.len());
                files.push(FileAccumulator::seed(&analysis));
                files.len() - 1
            }
        };

        let file = &mut files[idx];
        file.imports.extend(analysis.key_imports);
        for class in analysis.classes {
            file.absorb_class(class);
        }
    }

    files.into_iter().map(FileAccumulator::finish).collect()
}

struct FileAccumulator {
    record: MergedFileRecord,
    imports: BTreeSet<String>,
    class_index: HashMap<String, usize>,
}

impl FileAccumulator {
    fn seed(analysis: &ChunkAnalysis) -> Self {
        Self {
            record: MergedFileRecord {
                filename: analysis.filename.clone(),
                description: analysis.description.clone(),
                lines_of_code: analysis.lines_of_code,
                key_imports: Vec::new(),
                classes: Vec::new(),
            },
            imports: BTreeSet::new(),
            class_index: HashMap::new(),
        }
    }

    fn absorb_class(&mut self, mut class: ClassRecord) {
        match self.class_index.get(&class.name) {
            Some(&idx) => {
                let existing = &mut self.record.classes[idx];
                union_into(&mut existing.annotations, class.annotations);
                existing.methods.extend(class.methods);
            }
            None => {
                let mut annotations = Vec::with_capacity(class.annotations.len());
                union_into(&mut annotations, std::mem::take(&mut class.annotations));
                class.annotations = annotations;

                self.class_index
                    .insert(class.name.clone(), self.record.classes.len());
                self.record.classes.push(class);
            }
        }
    }

    fn finish(mut self) -> MergedFileRecord {
        self.record.key_imports = self.imports.into_iter().collect();
        self.record
    }
}

/// Append the values of `incoming` not already in `target`.
fn union_into(target: &mut Vec<String>, incoming: Vec<String>) {
    for value in incoming {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Complexity, MethodRecord};
    use std::collections::HashSet;

    fn method(signature: &str, description: &str, level: &str) -> MethodRecord {
        MethodRecord {
            signature: signature.to_string(),
            description: description.to_string(),
            complexity: Complexity {
                level: level.to_string(),
            },
        }
    }

    fn class(name: &str, annotations: &[&str], methods: Vec<MethodRecord>) -> ClassRecord {
        ClassRecord {
            name: name.to_string(),
            annotations: annotations.iter().map(|s| s.to_string()).collect(),
            description: format!("{} class", name),
            methods,
        }
    }

    fn analysis(
        filename: &str,
        description: &str,
        loc: u64,
        imports: &[&str],
        classes: Vec<ClassRecord>,
    ) -> ChunkAnalysis {
        ChunkAnalysis {
            filename: filename.to_string(),
            description: description.to_string(),
            lines_of_code: loc,
            key_imports: imports.iter().map(|s| s.to_string()).collect(),
            classes,
        }
    }

    fn as_set(values: &[String]) -> HashSet<&str> {
        values.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_results_by_filename(Vec::new()).is_empty());
    }

    #[test]
    fn test_disjoint_classes_concatenate() {
        let merged = merge_results_by_filename(vec![
            analysis("a.py", "d1", 10, &["os"], vec![class("A", &[], vec![])]),
            analysis("a.py", "d2", 20, &["sys", "os"], vec![class("B", &[], vec![])]),
        ]);

        assert_eq!(merged.len(), 1);
        let names: Vec<&str> = merged[0].classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(as_set(&merged[0].key_imports), HashSet::from(["os", "sys"]));
        assert_eq!(merged[0].key_imports.len(), 2);
    }

    #[test]
    fn test_same_class_methods_concatenate() {
        let merged = merge_results_by_filename(vec![
            analysis(
                "a.py",
                "d1",
                1,
                &[],
                vec![class("A", &["x", "shared"], vec![method("f()", "m1", "Low"), method("h()", "m3", "Low")])],
            ),
            analysis(
                "a.py",
                "d2",
                2,
                &[],
                vec![class("A", &["shared", "y"], vec![method("f()", "m1", "Low")])],
            ),
        ]);

        let classes = &merged[0].classes;
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].methods.len(), 3);
        let signatures: Vec<&str> = classes[0].methods.iter().map(|m| m.signature.as_str()).collect();
        assert_eq!(signatures, vec!["f()", "h()", "f()"]);
        assert_eq!(classes[0].annotations.len(), 3);
        assert_eq!(as_set(&classes[0].annotations), HashSet::from(["x", "shared", "y"]));
    }

    #[test]
    fn test_first_chunk_wins_description_and_loc() {
        let merged = merge_results_by_filename(vec![
            analysis("a.py", "first", 10, &[], vec![]),
            analysis("a.py", "second", 99, &[], vec![]),
            analysis("a.py", "", 0, &[], vec![]),
        ]);
        assert_eq!(merged[0].description, "first");
        assert_eq!(merged[0].lines_of_code, 10);
    }

    #[test]
    fn test_interleaved_files_keep_first_seen_order() {
        let merged = merge_results_by_filename(vec![
            analysis("b.py", "b1", 1, &["re"], vec![class("B", &[], vec![])]),
            analysis("a.py", "a1", 2, &[], vec![class("A", &[], vec![])]),
            analysis("b.py", "b2", 3, &["json"], vec![class("C", &[], vec![])]),
        ]);

        let names: Vec<&str> = merged.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["b.py", "a.py"]);
        assert_eq!(merged[0].description, "b1");
        assert_eq!(merged[0].classes.len(), 2);
        assert_eq!(as_set(&merged[0].key_imports), HashSet::from(["re", "json"]));
        assert_eq!(merged[1].classes.len(), 1);
    }

    #[test]
    fn test_classes_scoped_per_file() {
        let merged = merge_results_by_filename(vec![
            analysis("a.py", "", 0, &[], vec![class("Util", &[], vec![method("a()", "", "Low")])]),
            analysis("b.py", "", 0, &[], vec![class("Util", &[], vec![method("b()", "", "Low")])]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].classes[0].methods.len(), 1);
        assert_eq!(merged[1].classes[0].methods.len(), 1);
    }

    #[test]
    fn test_duplicate_annotations_in_single_chunk_collapse() {
        let merged = merge_results_by_filename(vec![analysis(
            "a.java",
            "",
            0,
            &["java.util.List", "java.util.List"],
            vec![class("Svc", &["@Service", "@Service"], vec![])],
        )]);
        assert_eq!(merged[0].key_imports, vec!["java.util.List"]);
        assert_eq!(merged[0].classes[0].annotations, vec!["@Service"]);
    }

    #[test]
    fn test_missing_collections_from_json() {
        let parsed: Vec<ChunkAnalysis> = [
            r#"{"filename": "a.py", "description": "d"}"#,
            r#"{"filename": "a.py", "classes": [], "key_imports": []}"#,
        ]
        .iter()
        .map(|raw| serde_json::from_str(raw).unwrap())
        .collect();

        let merged = merge_results_by_filename(parsed);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].classes.is_empty());
        assert!(merged[0].key_imports.is_empty());
    }

    #[test]
    fn test_end_to_end_two_chunks() {
        let chunk1 = r#"{"filename":"a.py","description":"d1","lines_of_code":10,"key_imports":["os"],
            "classes":[{"name":"A","annotations":["x"],"methods":[{"signature":"f()","description":"m1","complexity":{"level":"Low"}}]}]}"#;
        let chunk2 = r#"{"filename":"a.py","description":"d2","lines_of_code":20,"key_imports":["sys"],
            "classes":[{"name":"A","annotations":["y"],"methods":[{"signature":"g()","description":"m2","complexity":{"level":"High"}}]}]}"#;

        let merged = merge_results_by_filename(vec![
            serde_json::from_str::<ChunkAnalysis>(chunk1).unwrap(),
            serde_json::from_str::<ChunkAnalysis>(chunk2).unwrap(),
        ]);

        assert_eq!(merged.len(), 1);
        let file = &merged[0];
        assert_eq!(file.description, "d1");
        assert_eq!(file.lines_of_code, 10);
        assert_eq!(as_set(&file.key_imports), HashSet::from(["os", "sys"]));
        assert_eq!(file.classes.len(), 1);

        let a = &file.classes[0];
        assert_eq!(a.name, "A");
        assert_eq!(as_set(&a.annotations), HashSet::from(["x", "y"]));
        let signatures: Vec<&str> = a.methods.iter().map(|m| m.signature.as_str()).collect();
        assert_eq!(signatures, vec!["f()", "g()"]);
        assert_eq!(a.methods[1].complexity.level, "High");
    }
}
