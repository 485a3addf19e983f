//! OGR SQL subset over in-memory layers.
//!
//! Supported statements have the form
//!
//! ```text
//! SELECT [DISTINCT] * | expr [AS alias], ... FROM layer
//!     [WHERE expr] [ORDER BY expr [ASC|DESC], ...] [LIMIT n [OFFSET m]]
//! ```
//!
//! Expressions support `AND`, `OR`, `NOT`, comparisons, `[NOT] LIKE` (case
//! insensitive, `%` and `_` wildcards), `[NOT] IN`, `[NOT] BETWEEN`,
//! `IS [NOT] NULL`, arithmetic, `CONCAT`, `SUBSTR`, `UPPER`, `LOWER` and
//! `CAST(expr AS type)`. The select list may instead consist only of the
//! aggregates `COUNT`, `MIN`, `MAX`, `SUM` and `AVG`. The `FID` pseudo column
//! refers to the feature id.

mod expr;
mod lexer;
mod parser;

use std::cmp::Ordering;

use geo_types::Geometry;
use log::debug;

use crate::errors::*;
use crate::vector::ops::{SpatialFilter, SpatialFilterPolicy};
use crate::vector::{Defn, Feature, FieldDefn, FieldType, GeometryType, Layer};

pub use expr::Value;
pub(crate) use expr::Expr;
pub(crate) use parser::parse_expression;
use parser::{parse_select, Aggregate, Select, SelectItem};

/// Represents valid SQL dialects to use in SQL queries. See
/// <https://gdal.org/user/ogr_sql_sqlite_dialect.html>
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dialect {
    /// Use the default dialect, which is OGR SQL for every built-in driver.
    #[default]
    DEFAULT,

    /// Explicitly choose OGR SQL.
    OGR,
}

/// Parse `query` and return the name of the layer it reads from.
pub(crate) fn statement_table(query: &str) -> Result<String> {
    Ok(parse_select(query)?.table)
}

/// Run `query` against `layers` and return the result set as a new layer.
///
/// The result layer is named after the queried layer and keeps the FIDs and
/// geometries of the source features, except for aggregate and `DISTINCT`
/// queries, which produce geometry-less rows.
pub(crate) fn execute(
    layers: &[Layer],
    query: &str,
    spatial_filter: Option<&Geometry<f64>>,
    _dialect: Dialect,
) -> Result<Layer> {
    let select = parse_select(query)?;
    let source = layers
        .iter()
        .find(|l| l.name().eq_ignore_ascii_case(&select.table))
        .ok_or_else(|| GeoError::LayerNotFound(select.table.clone()))?;
    debug!("executing SQL on layer '{}': {query}", source.name());

    let where_clause = select
        .where_clause
        .clone()
        .map(|e| e.bind(source.defn(), source.name()))
        .transpose()?;
    let spatial_filter =
        spatial_filter.map(|g| SpatialFilter::new(g.clone(), SpatialFilterPolicy::default()));

    let mut rows: Vec<&Feature> = source
        .all_features()
        .filter(|f| {
            spatial_filter
                .as_ref()
                .map_or(true, |filter| filter.matches(f.geometry()))
                && where_clause.as_ref().map_or(true, |e| e.matches(f))
        })
        .collect();

    if !select.order_by.is_empty() {
        let keys = select
            .order_by
            .iter()
            .map(|o| Ok((o.expr.clone().bind(source.defn(), source.name())?, o.ascending)))
            .collect::<Result<Vec<_>>>()?;
        let mut keyed = rows
            .into_iter()
            .map(|f| {
                let values = keys
                    .iter()
                    .map(|(e, _)| e.eval(f).unwrap_or(Value::Null))
                    .collect::<Vec<_>>();
                (values, f)
            })
            .collect::<Vec<_>>();
        keyed.sort_by(|(a, _), (b, _)| {
            a.iter()
                .zip(b)
                .zip(&keys)
                .map(|((x, y), (_, ascending))| {
                    let ord = x.sort_cmp(y);
                    if *ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        rows = keyed.into_iter().map(|(_, f)| f).collect();
    }

    let has_aggregate = select
        .items
        .iter()
        .any(|i| matches!(i, SelectItem::Aggregate { .. }));
    let mut result = if has_aggregate {
        aggregate(&select, source, &rows)?
    } else {
        project(&select, source, &rows)?
    };

    if select.offset > 0 || select.limit.is_some() {
        let keep: Vec<u64> = result
            .all_features()
            .skip(select.offset)
            .take(select.limit.unwrap_or(usize::MAX))
            .filter_map(Feature::fid)
            .collect();
        let drop: Vec<u64> = result
            .all_features()
            .filter_map(Feature::fid)
            .filter(|fid| !keep.contains(fid))
            .collect();
        for fid in drop {
            result.delete_feature(fid)?;
        }
    }
    Ok(result)
}

/// Name of a selected column without alias.
fn column_name(expr: &Expr, source: &Defn, position: usize) -> String {
    match expr {
        Expr::Field(idx) => source
            .field(*idx)
            .map_or_else(|| format!("FIELD_{}", position + 1), |f| f.name().to_string()),
        Expr::Fid => "FID".to_string(),
        Expr::Call(_, args) if args.len() == 1 => column_name(&args[0], source, position),
        _ => format!("FIELD_{}", position + 1),
    }
}

fn add_column(defn: &mut Defn, field: FieldDefn) -> Result<()> {
    let name = field.name().to_string();
    defn.add_field(field).map_err(|_| GeoError::SqlError {
        position: 0,
        msg: format!("duplicate column '{name}' in result set"),
    })?;
    Ok(())
}

enum Column {
    Source(usize),
    Computed(Expr),
}

fn project(select: &Select, source: &Layer, rows: &[&Feature]) -> Result<Layer> {
    let src_defn = source.defn();
    let geometry_type = if select.distinct {
        GeometryType::None
    } else {
        source.geometry_type()
    };
    let mut defn = Defn::new(geometry_type);
    let mut columns = Vec::new();

    for (position, item) in select.items.iter().enumerate() {
        match item {
            SelectItem::Wildcard => {
                for (idx, field) in src_defn.fields().enumerate() {
                    add_column(&mut defn, field.clone())?;
                    columns.push(Column::Source(idx));
                }
            }
            SelectItem::Expr { expr, alias } => {
                let expr = expr.clone().bind(src_defn, source.name())?;
                let name = alias
                    .clone()
                    .unwrap_or_else(|| column_name(&expr, src_defn, position));
                match expr {
                    Expr::Field(idx) => {
                        let mut field = src_defn
                            .field(idx)
                            .cloned()
                            .unwrap_or_else(|| FieldDefn::new(&name, FieldType::String));
                        field.set_name(&name);
                        add_column(&mut defn, field)?;
                        columns.push(Column::Source(idx));
                    }
                    expr => {
                        add_column(&mut defn, FieldDefn::new(&name, expr.field_type(src_defn)))?;
                        columns.push(Column::Computed(expr));
                    }
                }
            }
            SelectItem::Aggregate { .. } => {
                return Err(GeoError::SqlError {
                    position: 0,
                    msg: "aggregate functions cannot be mixed with plain columns".to_string(),
                })
            }
        }
    }

    let mut result = Layer::with_defn(source.name(), defn, source.spatial_ref().cloned());
    let mut seen: Vec<Vec<Value>> = Vec::new();
    for (row_idx, row) in rows.iter().enumerate() {
        let mut values = Vec::with_capacity(columns.len());
        for column in &columns {
            values.push(match column {
                Column::Source(idx) => row.field_by_index(*idx).cloned(),
                Column::Computed(expr) => {
                    let field_type = expr.field_type(src_defn);
                    expr.eval(row)?.into_field_value(field_type)
                }
            });
        }

        let mut feature = Feature::new(result.defn());
        if select.distinct {
            let key: Vec<Value> = values
                .iter()
                .map(|v| v.as_ref().map_or(Value::Null, Value::from))
                .collect();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            feature.set_fid(Some(row_idx as u64));
        } else {
            feature.set_fid(row.fid());
            if let Some(g) = row.geometry() {
                feature.set_geometry(g.clone());
            }
        }
        for (idx, value) in values.into_iter().enumerate() {
            feature.set_field_by_index(idx, value);
        }
        result.create_feature(feature)?;
    }
    Ok(result)
}

fn aggregate(select: &Select, source: &Layer, rows: &[&Feature]) -> Result<Layer> {
    let src_defn = source.defn();
    let mut defn = Defn::new(GeometryType::None);
    let mut values = Vec::new();

    for item in &select.items {
        let SelectItem::Aggregate {
            func,
            arg,
            distinct,
            alias,
        } = item
        else {
            return Err(GeoError::SqlError {
                position: 0,
                msg: "aggregate functions cannot be mixed with plain columns".to_string(),
            });
        };
        let arg = arg
            .clone()
            .map(|e| e.bind(src_defn, source.name()))
            .transpose()?;

        let mut inputs: Vec<Value> = match &arg {
            Some(e) => rows
                .iter()
                .map(|f| e.eval(f))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .filter(|v| !v.is_null())
                .collect(),
            None => rows.iter().map(|_| Value::Integer(1)).collect(),
        };
        if *distinct {
            let mut unique: Vec<Value> = Vec::new();
            for v in inputs {
                if !unique.contains(&v) {
                    unique.push(v);
                }
            }
            inputs = unique;
        }

        let name = alias.clone().unwrap_or_else(|| {
            let column = arg
                .as_ref()
                .map_or_else(|| "*".to_string(), |e| column_name(e, src_defn, 0));
            format!("{}_{}", func.name(), column)
        });
        let (field_type, value) = match func {
            Aggregate::Count => (FieldType::Integer64, Value::Integer(inputs.len() as i64)),
            Aggregate::Min | Aggregate::Max => {
                let pick = inputs.into_iter().reduce(|a, b| {
                    let ord = a.sort_cmp(&b);
                    let keep_a = if *func == Aggregate::Min {
                        ord != Ordering::Greater
                    } else {
                        ord != Ordering::Less
                    };
                    if keep_a {
                        a
                    } else {
                        b
                    }
                });
                let field_type = arg
                    .as_ref()
                    .map_or(FieldType::Real, |e| e.field_type(src_defn));
                (field_type, pick.unwrap_or(Value::Null))
            }
            Aggregate::Sum | Aggregate::Avg => {
                let numbers = inputs
                    .iter()
                    .map(|v| match v {
                        Value::Integer(i) => Ok(*i as f64),
                        Value::Real(r) => Ok(*r),
                        other => Err(GeoError::SqlError {
                            position: 0,
                            msg: format!("{} of non-numeric value '{other}'", func.name()),
                        }),
                    })
                    .collect::<Result<Vec<f64>>>()?;
                let sum: f64 = numbers.iter().sum();
                let value = if numbers.is_empty() {
                    Value::Null
                } else if *func == Aggregate::Sum {
                    Value::Real(sum)
                } else {
                    Value::Real(sum / numbers.len() as f64)
                };
                (FieldType::Real, value)
            }
        };
        add_column(&mut defn, FieldDefn::new(&name, field_type))?;
        values.push((field_type, value));
    }

    let mut result = Layer::with_defn(source.name(), defn, None);
    let mut feature = Feature::new(result.defn());
    feature.set_fid(Some(0));
    for (idx, (field_type, value)) in values.into_iter().enumerate() {
        feature.set_field_by_index(idx, value.into_field_value(field_type));
    }
    result.create_feature(feature)?;
    Ok(result)
}
