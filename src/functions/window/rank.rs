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

//! Rank-family window functions: RANK, DENSE_RANK, CUME_DIST, PERCENT_RANK

use crate::core::{Result, Value};
use crate::functions::{WindowContext, WindowFunction};

fn rank_of(ctx: &WindowContext, row: usize) -> i64 {
    let peer = ctx.peers[row];
    ctx.peers.iter().position(|&p| p == peer).unwrap_or(row) as i64 + 1
}

/// RANK: 1 + the number of rows ranked strictly before the peer group
pub struct RankFunction;

impl WindowFunction for RankFunction {
    fn name(&self) -> &str {
        "RANK"
    }

    fn process(&self, ctx: &WindowContext, row: usize) -> Result<Value> {
        Ok(Value::Integer(rank_of(ctx, row)))
    }
}

/// DENSE_RANK: the peer-group ordinal itself, gap-free
pub struct DenseRankFunction;

impl WindowFunction for DenseRankFunction {
    fn name(&self) -> &str {
        "DENSE_RANK"
    }

    fn process(&self, ctx: &WindowContext, row: usize) -> Result<Value> {
        Ok(Value::Integer(ctx.peers[row] as i64 + 1))
    }
}

/// CUME_DIST: rows up to and including the peer group, over partition size
pub struct CumeDistFunction;

impl WindowFunction for CumeDistFunction {
    fn name(&self) -> &str {
        "CUME_DIST"
    }

    fn process(&self, ctx: &WindowContext, row: usize) -> Result<Value> {
        let peer = ctx.peers[row];
        let covered = ctx.peers.iter().filter(|&&p| p <= peer).count();
        Ok(Value::Float(covered as f64 / ctx.partition_len() as f64))
    }
}

/// PERCENT_RANK: (rank - 1) / (partition size - 1); 0 for one-row partitions
pub struct PercentRankFunction;

impl WindowFunction for PercentRankFunction {
    fn name(&self) -> &str {
        "PERCENT_RANK"
    }

    fn process(&self, ctx: &WindowContext, row: usize) -> Result<Value> {
        let len = ctx.partition_len();
        if len < 2 {
            return Ok(Value::Float(0.0));
        }
        Ok(Value::Float(
            (rank_of(ctx, row) - 1) as f64 / (len - 1) as f64,
        ))
    }
}
