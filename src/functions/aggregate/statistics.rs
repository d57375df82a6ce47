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

//! Statistical aggregate functions: STDEV, STDEVP, VAR, VARP, MEDIAN

use crate::core::Value;
use crate::functions::AggregateFunction;

fn variance(values: &[f64], population: bool) -> Option<f64> {
    let n = values.len();
    if n < if population { 1 } else { 2 } {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    let divisor = if population { n } else { n - 1 } as f64;
    Some(sum_sq / divisor)
}

/// VAR (sample) and VARP (population) variance
pub struct VarFunction {
    population: bool,
    values: Vec<f64>,
}

impl VarFunction {
    pub fn sample() -> VarFunction {
        VarFunction {
            population: false,
            values: Vec::new(),
        }
    }

    pub fn population() -> VarFunction {
        VarFunction {
            population: true,
            values: Vec::new(),
        }
    }
}

impl AggregateFunction for VarFunction {
    fn name(&self) -> &str {
        if self.population {
            "VARP"
        } else {
            "VAR"
        }
    }

    fn accumulate(&mut self, value: &Value) {
        if let Some(f) = value.as_float() {
            self.values.push(f);
        }
    }

    fn result(&self) -> Value {
        variance(&self.values, self.population)
            .map(Value::Float)
            .unwrap_or(Value::Null)
    }

    fn reset(&mut self) {
        self.values.clear();
    }
}

/// STDEV (sample) and STDEVP (population) standard deviation
pub struct StdevFunction {
    population: bool,
    values: Vec<f64>,
}

impl StdevFunction {
    pub fn sample() -> StdevFunction {
        StdevFunction {
            population: false,
            values: Vec::new(),
        }
    }

    pub fn population() -> StdevFunction {
        StdevFunction {
            population: true,
            values: Vec::new(),
        }
    }
}

impl AggregateFunction for StdevFunction {
    fn name(&self) -> &str {
        if self.population {
            "STDEVP"
        } else {
            "STDEV"
        }
    }

    fn accumulate(&mut self, value: &Value) {
        if let Some(f) = value.as_float() {
            self.values.push(f);
        }
    }

    fn result(&self) -> Value {
        variance(&self.values, self.population)
            .map(|v| Value::Float(v.sqrt()))
            .unwrap_or(Value::Null)
    }

    fn reset(&mut self) {
        self.values.clear();
    }
}

/// MEDIAN over the float-convertible values
#[derive(Default)]
pub struct MedianFunction {
    values: Vec<f64>,
}

impl AggregateFunction for MedianFunction {
    fn name(&self) -> &str {
        "MEDIAN"
    }

    fn accumulate(&mut self, value: &Value) {
        if let Some(f) = value.as_float() {
            self.values.push(f);
        }
    }

    fn result(&self) -> Value {
        if self.values.is_empty() {
            return Value::Null;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        };
        Value::from_f64(median)
    }

    fn reset(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(f: &mut dyn AggregateFunction, values: &[i64]) {
        for &v in values {
            f.accumulate(&Value::Integer(v));
        }
    }

    #[test]
    fn test_variance_sample_vs_population() {
        let mut var = VarFunction::sample();
        feed(&mut var, &[1, 2, 3, 4]);
        match var.result() {
            Value::Float(f) => assert!((f - 5.0 / 3.0).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }

        let mut varp = VarFunction::population();
        feed(&mut varp, &[1, 2, 3, 4]);
        match varp.result() {
            Value::Float(f) => assert!((f - 1.25).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sample_needs_two_values() {
        let mut var = VarFunction::sample();
        feed(&mut var, &[3]);
        assert_eq!(var.result(), Value::Null);

        let mut varp = VarFunction::population();
        feed(&mut varp, &[3]);
        assert_eq!(varp.result(), Value::Float(0.0));
    }

    #[test]
    fn test_stdev() {
        let mut stdevp = StdevFunction::population();
        feed(&mut stdevp, &[2, 4, 4, 4, 5, 5, 7, 9]);
        match stdevp.result() {
            Value::Float(f) => assert!((f - 2.0).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_median_odd_even() {
        let mut median = MedianFunction::default();
        feed(&mut median, &[5, 1, 3]);
        assert_eq!(median.result(), Value::Integer(3));

        median.reset();
        feed(&mut median, &[4, 1, 2, 3]);
        assert_eq!(median.result(), Value::Float(2.5));

        median.reset();
        assert_eq!(median.result(), Value::Null);
    }
}
