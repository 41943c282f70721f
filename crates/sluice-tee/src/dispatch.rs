use std::io::Write;

use arrow_array::RecordBatch;
use error_stack::{IntoReport, Report, ResultExt};
use sluice_physical::TeeSettings;

use crate::{Error, SpoolBuffer, TableStore};

/// Pager used when neither `SLUICE_PAGER` nor `PAGER` names one.
const FALLBACK_PAGER: &str = "less";

/// Label written to the pager when no symbol is configured.
const DEFAULT_LABEL: &str = "tee";

/// One side effect to run against the finalized spool.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Effect<'a> {
    /// Print the rendering to the terminal.
    Terminal,
    /// Pipe the rendering through the external pager.
    Pager,
    /// Export to a delimited file at the path.
    File(&'a str),
    /// Materialize into the named table.
    Table(&'a str),
}

/// Resolve the set of effects one invocation's settings select.
///
/// The pager replaces the plain terminal print when both are configured;
/// pure-pager mode never prints to stdout. File export and table
/// materialization combine freely with either.
pub(crate) fn selected_effects(settings: &TeeSettings) -> Vec<Effect<'_>> {
    let mut effects = Vec::new();
    if settings.pager {
        effects.push(Effect::Pager);
    } else if settings.terminal {
        effects.push(Effect::Terminal);
    }
    if let Some(path) = &settings.path {
        effects.push(Effect::File(path));
    }
    if let Some(name) = &settings.table_name {
        effects.push(Effect::Table(name));
    }
    effects
}

/// Run every configured side effect against the finalized spool.
///
/// The effects are independent, not transactional: each configured effect
/// runs regardless of earlier failures, and all failures are collected into
/// a single report returned at the end.
pub fn dispatch(
    spool: &SpoolBuffer,
    settings: &TeeSettings,
    store: Option<&dyn TableStore>,
) -> error_stack::Result<(), Error> {
    let effects = selected_effects(settings);
    let configured = effects.len();

    let mut failures: Vec<Report<Error>> = Vec::new();
    for effect in effects {
        let result = match effect {
            Effect::Terminal => render_terminal(spool, settings.symbol.as_deref()),
            Effect::Pager => render_pager(spool, settings.symbol.as_deref()),
            Effect::File(path) => export_file(spool, path),
            Effect::Table(name) => materialize(spool, name, store),
        };
        if let Err(report) = result {
            tracing::error!("tee side effect failed: {report:?}");
            failures.push(report);
        }
    }

    let failed = failures.len();
    let mut failures = failures.into_iter();
    match failures.next() {
        None => Ok(()),
        Some(mut combined) => {
            for report in failures {
                combined.extend_one(report);
            }
            Err(combined.change_context(Error::SideEffects { failed, configured }))
        }
    }
}

/// Pretty-format the full spool as a bordered table.
fn render(spool: &SpoolBuffer) -> error_stack::Result<String, Error> {
    let batches = spool.record_batches();
    let rendered = arrow::util::pretty::pretty_format_batches(&batches)
        .into_report()
        .change_context(Error::Render)?;
    Ok(rendered.to_string())
}

#[allow(clippy::print_stdout)]
fn render_terminal(spool: &SpoolBuffer, symbol: Option<&str>) -> error_stack::Result<(), Error> {
    let table = render(spool)?;
    if let Some(symbol) = symbol {
        println!("{symbol}");
    }
    println!("{table}");
    Ok(())
}

/// Resolve the pager program from the environment.
fn pager_program() -> String {
    std::env::var("SLUICE_PAGER")
        .ok()
        .filter(|program| !program.is_empty())
        .or_else(|| std::env::var("PAGER").ok().filter(|p| !p.is_empty()))
        .unwrap_or_else(|| FALLBACK_PAGER.to_owned())
}

fn render_pager(spool: &SpoolBuffer, symbol: Option<&str>) -> error_stack::Result<(), Error> {
    let table = render(spool)?;
    let program = pager_program();
    let error = || Error::Pager(program.clone());

    let mut child = std::process::Command::new(&program)
        .stdin(std::process::Stdio::piped())
        .spawn()
        .into_report()
        .change_context_lazy(error)?;
    {
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| Report::new(error()))?;
        writeln!(stdin, "{}", symbol.unwrap_or(DEFAULT_LABEL))
            .into_report()
            .change_context_lazy(error)?;
        stdin
            .write_all(table.as_bytes())
            .into_report()
            .change_context_lazy(error)?;
        writeln!(stdin).into_report().change_context_lazy(error)?;
    }
    let status = child.wait().into_report().change_context_lazy(error)?;
    error_stack::ensure!(status.success(), error());
    Ok(())
}

/// Stream the spool through a delimited-text writer.
///
/// The header row carries the declared column names. An empty spool still
/// produces a header-only file.
fn export_file(spool: &SpoolBuffer, path: &str) -> error_stack::Result<(), Error> {
    let error = || Error::FileExport(path.to_owned());

    let file = std::fs::File::create(path)
        .into_report()
        .change_context_lazy(error)?;
    let mut writer = arrow::csv::WriterBuilder::new()
        .has_headers(true)
        .build(std::io::BufWriter::new(file));

    let mut cursor = spool.cursor();
    let mut wrote = false;
    while let Some(batch) = spool.scan(&mut cursor) {
        writer
            .write(batch.data())
            .into_report()
            .change_context_lazy(error)?;
        wrote = true;
    }
    if !wrote {
        let empty = RecordBatch::new_empty(spool.schema().clone());
        writer.write(&empty).into_report().change_context_lazy(error)?;
    }
    writer
        .into_inner()
        .flush()
        .into_report()
        .change_context_lazy(error)?;
    Ok(())
}

/// Create the target table if absent and bulk-append every buffered row.
fn materialize(
    spool: &SpoolBuffer,
    name: &str,
    store: Option<&dyn TableStore>,
) -> error_stack::Result<(), Error> {
    let Some(store) = store else {
        error_stack::bail!(Error::NoTableStore);
    };
    let error = || Error::Materialize(name.to_owned());

    let mut appender = store
        .create_table_if_absent(name, spool.schema().clone())
        .change_context_lazy(error)?;
    let mut cursor = spool.cursor();
    while let Some(batch) = spool.scan(&mut cursor) {
        appender
            .append(batch.into_record_batch())
            .change_context_lazy(error)?;
    }
    appender.close().change_context_lazy(error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_batch::Batch;
    use sluice_testing::int64_batch;

    fn settings() -> TeeSettings {
        TeeSettings::default()
    }

    #[test]
    fn test_default_selects_terminal_only() {
        assert_eq!(selected_effects(&settings()), vec![Effect::Terminal]);
    }

    #[test]
    fn test_pure_pager_does_not_select_terminal() {
        let settings = TeeSettings {
            pager: true,
            terminal: false,
            ..settings()
        };
        assert_eq!(selected_effects(&settings), vec![Effect::Pager]);
    }

    #[test]
    fn test_pager_replaces_terminal() {
        let settings = TeeSettings {
            pager: true,
            terminal: true,
            ..settings()
        };
        assert_eq!(selected_effects(&settings), vec![Effect::Pager]);
    }

    #[test]
    fn test_effects_combine() {
        let settings = TeeSettings {
            terminal: false,
            path: Some("out.csv".to_owned()),
            table_name: Some("t".to_owned()),
            ..settings()
        };
        assert_eq!(
            selected_effects(&settings),
            vec![Effect::File("out.csv"), Effect::Table("t")]
        );
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let batch = int64_batch(&[("a", vec![1, 2]), ("b", vec![10, 20])]);
        let spool = SpoolBuffer::new(batch.schema());
        spool.append(Batch::new(batch)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_file(&spool, path.to_str().unwrap()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines, vec!["a,b", "1,10", "2,20"]);
    }

    #[test]
    fn test_export_empty_spool_is_header_only() {
        let schema = int64_batch(&[("a", vec![1]), ("b", vec![2])]).schema();
        let spool = SpoolBuffer::new(schema);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        export_file(&spool, path.to_str().unwrap()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines, vec!["a,b"]);
    }

    #[test]
    fn test_file_failure_does_not_block_table_effect() {
        use std::sync::Arc;

        let batch = int64_batch(&[("a", vec![7])]);
        let spool = SpoolBuffer::new(batch.schema());
        spool.append(Batch::new(batch)).unwrap();

        let store = Arc::new(recording::RecordingStore::default());
        let settings = TeeSettings {
            terminal: false,
            path: Some("/nonexistent-dir/out.csv".to_owned()),
            table_name: Some("t".to_owned()),
            ..TeeSettings::default()
        };

        let result = dispatch(&spool, &settings, Some(store.as_ref()));
        // The unwritable path fails, but the materialization still ran.
        assert!(result.is_err());
        assert_eq!(store.rows("t"), 1);
    }

    #[test]
    fn test_materialize_appends_all_batches() {
        use std::sync::Arc;

        let spool = SpoolBuffer::new(int64_batch(&[("a", vec![0])]).schema());
        for start in [0, 3] {
            let batch = int64_batch(&[("a", vec![start, start + 1, start + 2])]);
            spool.append(Batch::new(batch)).unwrap();
        }

        let store = Arc::new(recording::RecordingStore::default());
        materialize(&spool, "t", Some(store.as_ref())).unwrap();
        assert_eq!(store.rows("t"), 6);
    }

    mod recording {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        use arrow_array::RecordBatch;
        use arrow_schema::SchemaRef;

        use crate::{StoreError, TableAppender, TableStore};

        #[derive(Default)]
        pub(super) struct RecordingStore {
            tables: Arc<Mutex<HashMap<String, Vec<RecordBatch>>>>,
        }

        impl RecordingStore {
            pub(super) fn rows(&self, name: &str) -> usize {
                self.tables
                    .lock()
                    .unwrap()
                    .get(name)
                    .map(|batches| batches.iter().map(RecordBatch::num_rows).sum())
                    .unwrap_or(0)
            }
        }

        impl TableStore for RecordingStore {
            fn create_table_if_absent(
                &self,
                name: &str,
                _schema: SchemaRef,
            ) -> error_stack::Result<Box<dyn TableAppender>, StoreError> {
                self.tables
                    .lock()
                    .unwrap()
                    .entry(name.to_owned())
                    .or_default();
                Ok(Box::new(RecordingAppender {
                    name: name.to_owned(),
                    pending: Vec::new(),
                    tables: self.tables.clone(),
                }))
            }
        }

        struct RecordingAppender {
            name: String,
            pending: Vec<RecordBatch>,
            tables: Arc<Mutex<HashMap<String, Vec<RecordBatch>>>>,
        }

        impl TableAppender for RecordingAppender {
            fn append(&mut self, batch: RecordBatch) -> error_stack::Result<(), StoreError> {
                self.pending.push(batch);
                Ok(())
            }

            fn close(self: Box<Self>) -> error_stack::Result<(), StoreError> {
                let mut tables = self.tables.lock().unwrap();
                tables.entry(self.name).or_default().extend(self.pending);
                Ok(())
            }
        }
    }
}
