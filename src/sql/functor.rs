/// Row consumers fed by the SELECT pipeline
///
/// A functor sees `init` once, `feed` for every virtual row that passed the
/// WHERE conjunction, then `done`. It owns the header and the rows it
/// writes, so projection and aggregation stay out of the join core.
use super::ast::{CountArg, OrderBy, Projection};
use super::evaluator::Scope;
use super::join::VirtualRow;
use crate::error::{EngineError, Result};
use crate::protocol::RowSink;
use crate::types::Value;
use std::cmp::Ordering;

pub trait SelectFunctor {
    fn init(&mut self, sink: &mut dyn RowSink) -> Result<()>;
    fn feed(&mut self, row: &VirtualRow, sink: &mut dyn RowSink) -> Result<()>;
    fn done(&mut self, sink: &mut dyn RowSink) -> Result<()>;
}

/// Pick the functor for a projection list.
pub fn build_functor(
    projections: &[Projection],
    order_by: &[OrderBy],
    scope: &Scope,
) -> Result<Box<dyn SelectFunctor>> {
    let counts = projections
        .iter()
        .filter(|p| matches!(p, Projection::Count(_)))
        .count();
    match (counts, projections) {
        (0, _) => Ok(Box::new(ProjectionFunctor::new(projections, order_by, scope)?)),
        (1, [Projection::Count(arg)]) => Ok(Box::new(CountFunctor::new(arg, scope)?)),
        _ => Err(EngineError::Malformed(
            "COUNT cannot be combined with other columns".to_string(),
        )),
    }
}

struct SortKey {
    key: String,
    descending: bool,
}

/// Projects named attributes (or `*`), optionally buffering for ORDER BY
pub struct ProjectionFunctor {
    header: Vec<String>,
    keys: Vec<String>,
    sort: Vec<SortKey>,
    buffered: Vec<(Vec<Value>, Vec<String>)>,
}

impl ProjectionFunctor {
    pub fn new(projections: &[Projection], order_by: &[OrderBy], scope: &Scope) -> Result<Self> {
        let mut header = Vec::new();
        let mut keys = Vec::new();
        for projection in projections {
            match projection {
                Projection::Star => {
                    for (table, attributes) in scope.tables() {
                        for attribute in attributes {
                            header.push(attribute.clone());
                            keys.push(format!("{}.{}", table, attribute));
                        }
                    }
                }
                Projection::Column(column) => {
                    keys.push(scope.resolve(column)?);
                    header.push(column.name.clone());
                }
                Projection::Count(_) => {
                    return Err(EngineError::Malformed("unexpected COUNT".to_string()))
                }
            }
        }

        let sort = order_by
            .iter()
            .map(|o| {
                Ok(SortKey {
                    key: scope.resolve(&o.column)?,
                    descending: o.descending,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            header,
            keys,
            sort,
            buffered: Vec::new(),
        })
    }

    fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (index, key) in self.sort.iter().enumerate() {
            let ordering = a[index].sort_cmp(&b[index]);
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn lookup<'r>(row: &'r VirtualRow, key: &str) -> Result<&'r Value> {
    row.get(key)
        .ok_or_else(|| EngineError::AttributeNotInRow(key.to_string()))
}

impl SelectFunctor for ProjectionFunctor {
    fn init(&mut self, sink: &mut dyn RowSink) -> Result<()> {
        sink.write_row_header(self.header.clone())
    }

    fn feed(&mut self, row: &VirtualRow, sink: &mut dyn RowSink) -> Result<()> {
        let projected = self
            .keys
            .iter()
            .map(|key| lookup(row, key).map(|v| v.to_string()))
            .collect::<Result<Vec<_>>>()?;

        if self.sort.is_empty() {
            return sink.write_row(projected);
        }
        let sort_values = self
            .sort
            .iter()
            .map(|s| lookup(row, &s.key).cloned())
            .collect::<Result<Vec<_>>>()?;
        self.buffered.push((sort_values, projected));
        Ok(())
    }

    fn done(&mut self, sink: &mut dyn RowSink) -> Result<()> {
        if !self.sort.is_empty() {
            let mut buffered = std::mem::take(&mut self.buffered);
            // sort_by is stable: ties keep scan order
            buffered.sort_by(|(a, _), (b, _)| self.compare(a, b));
            for (_, row) in buffered {
                sink.write_row(row)?;
            }
        }
        sink.write_row_end()
    }
}

/// `COUNT(*)` counts rows, `COUNT(col)` counts non-null values
pub struct CountFunctor {
    header: String,
    key: Option<String>,
    count: u64,
}

impl CountFunctor {
    pub fn new(arg: &CountArg, scope: &Scope) -> Result<Self> {
        match arg {
            CountArg::Star => Ok(Self {
                header: "COUNT(*)".to_string(),
                key: None,
                count: 0,
            }),
            CountArg::Column(column) => Ok(Self {
                header: format!("COUNT({})", column),
                key: Some(scope.resolve(column)?),
                count: 0,
            }),
        }
    }
}

impl SelectFunctor for CountFunctor {
    fn init(&mut self, sink: &mut dyn RowSink) -> Result<()> {
        sink.write_row_header(vec![self.header.clone()])
    }

    fn feed(&mut self, row: &VirtualRow, _sink: &mut dyn RowSink) -> Result<()> {
        let counted = match &self.key {
            Some(key) => !lookup(row, key)?.is_null(),
            None => true,
        };
        if counted {
            self.count += 1;
        }
        Ok(())
    }

    fn done(&mut self, sink: &mut dyn RowSink) -> Result<()> {
        sink.write_row(vec![self.count.to_string()])?;
        sink.write_row_end()
    }
}
