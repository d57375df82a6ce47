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

//! Data-parallel record passes
//!
//! Position-preserving map over record indices: each worker computes
//! values for its own indices of a pre-sized output, so record order is
//! untouched. Parallelism only pays off past a row-count threshold;
//! below it, or with one configured CPU, the pass runs sequentially.
//! Both paths poll the cancellation token.

use rayon::prelude::*;

use crate::core::Result;

use super::context::ExecContext;

/// Minimum records per worker before a pass goes parallel
pub const MIN_RECORDS_PER_WORKER: usize = 80;

fn should_parallelize(ctx: &ExecContext, len: usize) -> bool {
    1 < ctx.cpu && MIN_RECORDS_PER_WORKER * 2 <= len
}

/// Compute `f(0..len)` into a Vec, in parallel when worthwhile
pub fn map_indexed<T, F>(ctx: &ExecContext, len: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync,
{
    if should_parallelize(ctx, len) {
        (0..len)
            .into_par_iter()
            .map(|i| {
                ctx.check()?;
                f(i)
            })
            .collect()
    } else {
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            if i % MIN_RECORDS_PER_WORKER == 0 {
                ctx.check()?;
            }
            out.push(f(i)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;

    #[test]
    fn test_map_preserves_order() {
        let ctx = ExecContext::new(4);
        let out = map_indexed(&ctx, 1000, |i| Ok(i * 2)).unwrap();
        assert_eq!(out.len(), 1000);
        assert_eq!(out[0], 0);
        assert_eq!(out[999], 1998);
    }

    #[test]
    fn test_map_propagates_error() {
        let ctx = ExecContext::new(4);
        let result = map_indexed(&ctx, 500, |i| {
            if i == 250 {
                Err(Error::internal("boom"))
            } else {
                Ok(i)
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_map_observes_cancellation() {
        let ctx = ExecContext::new(1);
        ctx.cancel();
        let result = map_indexed(&ctx, 1000, Ok);
        assert_eq!(result, Err(Error::Cancelled));
    }
}
