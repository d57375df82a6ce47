// Copyright 2026 Flatsql Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Commit and rollback
//!
//! During a transaction DML/DDL only mutates cached views; the cache plus
//! each view's load-time snapshot is the whole transaction log. COMMIT
//! emits the buffered result output in order, then flushes every cached
//! non-temporary view whose header or records differ from its snapshot
//! (temp file + rename). A failed flush aborts the commit naming the
//! file; earlier flushes stay on disk. ROLLBACK just drops the buffers.

use std::path::Path;

use crate::codec::{self, FileHandler, FileInfo};
use crate::core::{Error, Result, Value};

use super::context::ExecContext;
use super::driver::Executor;
use super::flags::Flags;
use super::view::View;

impl Executor<'_> {
    /// Flush the transaction: result output first, then modified files
    pub fn commit(&mut self, ctx: &ExecContext) -> Result<()> {
        let flags = self.session.flags.read().clone();
        let mut out = String::new();

        for result in &self.result_set {
            if let Some(view) = &result.view {
                out.push_str(&encode_select_view(view, &flags)?);
                out.push('\n');
            }
            if !result.log.is_empty() {
                out.push_str(&result.log);
                out.push('\n');
            }
        }

        for key in self.session.cached_views.keys() {
            ctx.check()?;
            let view = self.session.cached_views.get(&key)?;
            let Some(info) = view.file_info.clone() else {
                continue;
            };
            if info.is_temporary {
                continue;
            }
            if !info.is_modified(&view.header, &view.records) {
                continue;
            }

            let created = self.flush_view(&view, &info, &flags)?;
            if created {
                out.push_str(&format!("Commit: file {:?} is created.\n", info.path));
            } else {
                out.push_str(&format!("Commit: file {:?} is updated.\n", info.path));
            }
        }

        self.result_set.clear();
        self.session.clear_transaction_state();
        self.append_log(&out);
        Ok(())
    }

    /// Drop the transaction buffers without touching disk
    pub fn rollback(&mut self) {
        self.result_set.clear();
        self.session.clear_transaction_state();
        self.append_log("Rolled back.\n");
    }

    fn append_log(&mut self, text: &str) {
        self.log_mut().push_str(text);
    }

    /// Re-encode one view and write it back, returning true when a new
    /// file was created
    fn flush_view(&self, view: &View, info: &FileInfo, flags: &Flags) -> Result<bool> {
        let (columns, rows) = view_table(view);

        let mut write_info = info.clone();
        if let Some(line_break) = flags.line_break {
            write_info.line_break = line_break;
        }

        let text = codec::encode_table(&write_info, &columns, &rows).map_err(|e| {
            Error::CommitFailed {
                path: info.path.clone(),
                message: e.to_string(),
            }
        })?;
        let bytes = codec::text::encode(&text, write_info.encoding);

        let handler = self.session.handlers.lock().remove(&info.path.to_uppercase());
        match handler {
            Some(handler) => {
                handler.write_atomic(&bytes).map_err(|e| Error::CommitFailed {
                    path: info.path.clone(),
                    message: e.to_string(),
                })?;
                Ok(false)
            }
            None => {
                let path = Path::new(&info.path);
                if path.exists() {
                    // Modified without a held handler: take the lock for
                    // the duration of the write
                    let handler =
                        FileHandler::for_update(path, flags.wait_timeout, flags.retry_delay)
                            .map_err(|e| Error::CommitFailed {
                                path: info.path.clone(),
                                message: e.to_string(),
                            })?;
                    handler.write_atomic(&bytes).map_err(|e| Error::CommitFailed {
                        path: info.path.clone(),
                        message: e.to_string(),
                    })?;
                    Ok(false)
                } else {
                    codec::create_new_file(path, &bytes).map_err(|e| Error::CommitFailed {
                        path: info.path.clone(),
                        message: e.to_string(),
                    })?;
                    Ok(true)
                }
            }
        }
    }
}

/// Scalar column/row projection of a finalized view
fn view_table(view: &View) -> (Vec<String>, Vec<Vec<Value>>) {
    let columns = view.header.table_column_names();
    let rows = view
        .records
        .iter()
        .map(|record| record.iter().map(|cell| cell.value().clone()).collect())
        .collect();
    (columns, rows)
}

/// Render a SELECT result with the export flags
fn encode_select_view(view: &View, flags: &Flags) -> Result<String> {
    let (columns, rows) = view_table(view);
    let mut info = FileInfo::new("", flags.export_format);
    info.delimiter = if flags.export_format == codec::Format::Tsv {
        '\t'
    } else {
        flags.write_delimiter
    };
    info.no_header = flags.no_header;
    info.enclose_all = flags.enclose_all;
    info.json_escape = flags.json_escape;
    codec::encode_table(&info, &columns, &rows)
}
