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

//! Analytic function execution
//!
//! Partition the view by the PARTITION BY key tuple, sort the whole view
//! by the embedded ORDER BY (sharing the per-cell sort-value cache with
//! the outer ORDER BY), then compute the function per row over the framed
//! slice of its partition. Results land in one appended scratch cell per
//! record; the caller adds the matching header field.

use rustc_hash::FxHashMap;

use crate::ast::{AnalyticFunction, FrameBound, FrameUnits, WindowFrame};
use crate::core::{compare, Cell, Error, Result, Value};
use crate::functions::{self, WindowContext};

use super::context::ExecContext;
use super::driver;
use super::filter::Filter;
use super::sort;
use super::view::View;

/// What kind of computation the analytic name resolves to
enum AnalyticKind {
    Window,
    Aggregate,
    UserAggregate(crate::ast::FunctionDeclaration),
}

/// Evaluate one analytic function over the view, appending one result
/// cell per record
pub fn evaluate(
    view: &mut View,
    ctx: &ExecContext,
    filter: &Filter,
    function: &AnalyticFunction,
) -> Result<()> {
    let kind = if functions::is_window(&function.name) {
        AnalyticKind::Window
    } else if functions::is_aggregate(&function.name)
        || functions::is_list_aggregate(&function.name)
    {
        AnalyticKind::Aggregate
    } else {
        match filter.session.functions.lock().get(&function.name) {
            Some(decl) if decl.cursor.is_some() => AnalyticKind::UserAggregate(decl),
            _ => return Err(Error::FunctionNotExist(function.name.clone())),
        }
    };

    let mut partition_indices = Vec::with_capacity(function.partition.len());
    for expr in &function.partition {
        partition_indices.push(view.eval_column(ctx, filter, expr, None)?);
    }

    // The cell-level sort-value cache spans the analytic ORDER BY and the
    // outer ORDER BY of the same query
    if view.sort_values_in_each_cell.is_none() {
        view.sort_values_in_each_cell = Some(vec![FxHashMap::default(); view.records.len()]);
    }
    if !function.order_by.is_empty() {
        view.order_by(ctx, filter, &function.order_by)?;
    }

    let result = analyze(view, ctx, filter, function, &partition_indices, kind);

    view.sort_values_in_each_record.clear();
    view.sort_directions.clear();
    view.sort_null_positions.clear();
    result
}

fn analyze(
    view: &mut View,
    ctx: &ExecContext,
    filter: &Filter,
    function: &AnalyticFunction,
    partition_indices: &[usize],
    kind: AnalyticKind,
) -> Result<()> {
    let record_len = view.records.len();
    let ordered = !function.order_by.is_empty();

    // Bucket record indices by partition key, preserving view order
    let mut partitions: Vec<Vec<usize>> = Vec::new();
    {
        let mut keyed: FxHashMap<String, usize> = FxHashMap::default();
        for i in 0..record_len {
            ctx.check()?;
            let values: Vec<Value> = partition_indices
                .iter()
                .map(|&idx| view.records[i][idx].value().clone())
                .collect();
            let key = compare::comparison_key(&values);
            match keyed.get(&key) {
                Some(&slot) => partitions[slot].push(i),
                None => {
                    keyed.insert(key, partitions.len());
                    partitions.push(vec![i]);
                }
            }
        }
    }

    // Per-row argument values and the constant extra arguments
    let takes_row_value = takes_row_argument(&function.name, &kind);
    let (values, const_args) = {
        let v: &View = view;
        let mut values = vec![Value::Null; record_len];
        let mut args_start = 0;
        if takes_row_value {
            if let Some(arg) = function.args.first() {
                args_start = 1;
                for (i, slot) in values.iter_mut().enumerate() {
                    ctx.check()?;
                    *slot = filter.with_record(v, i).evaluate(arg)?;
                }
            } else if matches!(kind, AnalyticKind::Aggregate)
                && function.name.eq_ignore_ascii_case("COUNT")
            {
                // COUNT(*) over a window counts rows
                values = vec![Value::Integer(1); record_len];
            } else {
                return Err(Error::FunctionArgumentLength {
                    name: function.name.clone(),
                    expected: "at least 1 argument".to_string(),
                    got: 0,
                });
            }
        }
        let mut const_args = Vec::new();
        for arg in function.args.iter().skip(args_start) {
            // Constant arguments may still reference the current row
            let value = if 0 < record_len {
                filter.with_record(v, 0).evaluate(arg)?
            } else {
                filter.evaluate(arg).unwrap_or(Value::Null)
            };
            const_args.push(value);
        }
        (values, const_args)
    };

    let mut results = vec![Value::Null; record_len];
    for rows in &partitions {
        ctx.check()?;
        let partition_values: Vec<Value> = rows.iter().map(|&i| values[i].clone()).collect();
        let peers = peer_ordinals(view, rows, ordered);

        for (pos, &record_index) in rows.iter().enumerate() {
            let frame = frame_bounds(
                function.frame.as_ref(),
                pos,
                rows.len(),
                &peers,
                ordered,
            )?;
            let window_ctx = WindowContext {
                values: &partition_values,
                peers: &peers,
                frame,
                args: &const_args,
            };

            results[record_index] = match &kind {
                AnalyticKind::Window => {
                    let f = functions::window_instance(&function.name)
                        .ok_or_else(|| Error::FunctionNotExist(function.name.clone()))?;
                    f.process(&window_ctx, pos)?
                }
                AnalyticKind::Aggregate => {
                    let mut list: Vec<Value> = window_ctx.framed_values().to_vec();
                    if function.distinct {
                        list = compare::distinguish(list);
                    }
                    let separator = const_args
                        .first()
                        .and_then(|v| v.as_text().map(|s| s.to_string()));
                    let mut f = functions::aggregate_instance(
                        &function.name,
                        filter.session.ignore_case(),
                    )
                    .or_else(|| {
                        functions::list_aggregate_instance(
                            &function.name,
                            separator.as_deref(),
                        )
                    })
                    .ok_or_else(|| Error::FunctionNotExist(function.name.clone()))?;
                    for value in &list {
                        f.accumulate(value);
                    }
                    f.result()
                }
                AnalyticKind::UserAggregate(declaration) => {
                    let mut list: Vec<Value> = window_ctx.framed_values().to_vec();
                    if function.distinct {
                        list = compare::distinguish(list);
                    }
                    driver::execute_aggregate_function(
                        filter,
                        declaration,
                        list,
                        const_args.clone(),
                    )?
                }
            };
        }
    }

    for (record, value) in view.records.iter_mut().zip(results) {
        record.push(Cell::new(value));
    }
    Ok(())
}

/// Whether the first argument is evaluated per row (value functions and
/// aggregates) or is a constant parameter (NTILE)
fn takes_row_argument(name: &str, kind: &AnalyticKind) -> bool {
    match kind {
        AnalyticKind::Window => !matches!(
            name.to_uppercase().as_str(),
            "ROW_NUMBER" | "RANK" | "DENSE_RANK" | "CUME_DIST" | "PERCENT_RANK" | "NTILE"
        ),
        _ => true,
    }
}

/// Peer-group ordinal per partition row: rows with equivalent sort keys
/// share one ordinal; without ORDER BY the whole partition is one peer
/// group
fn peer_ordinals(view: &View, rows: &[usize], ordered: bool) -> Vec<usize> {
    if !ordered || view.sort_values_in_each_record.is_empty() {
        return vec![0; rows.len()];
    }
    let mut peers = Vec::with_capacity(rows.len());
    let mut ordinal = 0;
    for (pos, &record_index) in rows.iter().enumerate() {
        if 0 < pos {
            let prev = rows[pos - 1];
            if !sort::equivalent(
                &view.sort_values_in_each_record[prev],
                &view.sort_values_in_each_record[record_index],
            ) {
                ordinal += 1;
            }
        }
        peers.push(ordinal);
    }
    peers
}

/// Compute the framed slice `[start, end)` for one partition row
fn frame_bounds(
    frame: Option<&WindowFrame>,
    pos: usize,
    len: usize,
    peers: &[usize],
    ordered: bool,
) -> Result<(usize, usize)> {
    let peer_start = |pos: usize| peers.iter().position(|&p| p == peers[pos]).unwrap_or(pos);
    let peer_end = |pos: usize| {
        peers
            .iter()
            .rposition(|&p| p == peers[pos])
            .map(|i| i + 1)
            .unwrap_or(pos + 1)
    };

    let Some(frame) = frame else {
        // Default frame: whole partition, or RANGE UNBOUNDED PRECEDING
        // to CURRENT ROW under an ORDER BY
        return Ok(if ordered { (0, peer_end(pos)) } else { (0, len) });
    };

    let start_bound = &frame.start;
    let end_bound = frame.end.as_ref().unwrap_or(&FrameBound::CurrentRow);

    let (start, end) = match frame.units {
        FrameUnits::Rows => {
            let start = match start_bound {
                FrameBound::UnboundedPreceding => 0,
                FrameBound::Preceding(n) => pos.saturating_sub(usize_of(*n)?),
                FrameBound::CurrentRow => pos,
                FrameBound::Following(n) => (pos + usize_of(*n)?).min(len),
                FrameBound::UnboundedFollowing => len,
            };
            let end = match end_bound {
                FrameBound::UnboundedPreceding => 0,
                FrameBound::Preceding(n) => (pos + 1).saturating_sub(usize_of(*n)?),
                FrameBound::CurrentRow => pos + 1,
                FrameBound::Following(n) => (pos + 1 + usize_of(*n)?).min(len),
                FrameBound::UnboundedFollowing => len,
            };
            (start, end)
        }
        FrameUnits::Range => {
            let start = match start_bound {
                FrameBound::UnboundedPreceding => 0,
                FrameBound::CurrentRow => peer_start(pos),
                FrameBound::UnboundedFollowing => len,
                _ => {
                    return Err(Error::invalid_argument(
                        "RANGE frames support only UNBOUNDED and CURRENT ROW bounds",
                    ))
                }
            };
            let end = match end_bound {
                FrameBound::UnboundedPreceding => 0,
                FrameBound::CurrentRow => peer_end(pos),
                FrameBound::UnboundedFollowing => len,
                _ => {
                    return Err(Error::invalid_argument(
                        "RANGE frames support only UNBOUNDED and CURRENT ROW bounds",
                    ))
                }
            };
            (start, end)
        }
    };
    Ok((start.min(end), end.min(len)))
}

fn usize_of(n: i64) -> Result<usize> {
    if n < 0 {
        return Err(Error::invalid_argument(
            "frame offsets must not be negative",
        ));
    }
    Ok(n as usize)
}
