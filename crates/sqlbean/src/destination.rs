//! Result destinations.
//!
//! A query result is bound into one of a closed set of shapes. Single-row
//! shapes serve `get`; sequence shapes serve `find`. Asking `get` for a
//! sequence (or `find` for a single row) is a [`TypeMismatch`] raised before
//! any SQL runs.
//!
//! Rows bind to bean fields by column name, ignoring ASCII case. Result
//! columns with no matching field are ignored. Every row is converted in
//! full before the destination is written, so a conversion failure leaves
//! the destination as it was.
//!
//! [`TypeMismatch`]: sqlbean_core::Error::TypeMismatch

use sqlbean_core::row::with_column;
use sqlbean_core::{Bean, Error, PrimaryKey, Result, Row, TableMetadata, Value};
use std::collections::{BTreeMap, HashMap};

/// One row as column name -> value.
pub type RawRow = BTreeMap<String, Value>;

/// Where a query's rows go.
#[derive(Debug)]
pub enum Destination<'a, T: Bean> {
    One(&'a mut T),
    Many(&'a mut Vec<T>),
    Boxed(&'a mut Vec<Box<T>>),
    /// Beans keyed by primary key
    Keyed(&'a mut HashMap<PrimaryKey, T>),
    /// First column of the first row
    Scalar(&'a mut Value),
    /// First column of every row
    Scalars(&'a mut Vec<Value>),
    Raw(&'a mut RawRow),
    RawMany(&'a mut Vec<RawRow>),
}

impl<T: Bean> Destination<'_, T> {
    /// Whether the shape holds at most one row.
    pub fn is_single(&self) -> bool {
        matches!(
            self,
            Destination::One(_) | Destination::Scalar(_) | Destination::Raw(_)
        )
    }

    /// Whether rows are bound into beans.
    pub fn is_bean(&self) -> bool {
        matches!(
            self,
            Destination::One(_)
                | Destination::Many(_)
                | Destination::Boxed(_)
                | Destination::Keyed(_)
        )
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Destination::One(_) => "bean",
            Destination::Many(_) => "Vec<bean>",
            Destination::Boxed(_) => "Vec<Box<bean>>",
            Destination::Keyed(_) => "HashMap<PrimaryKey, bean>",
            Destination::Scalar(_) => "scalar",
            Destination::Scalars(_) => "Vec<scalar>",
            Destination::Raw(_) => "raw row",
            Destination::RawMany(_) => "Vec<raw row>",
        }
    }

    /// Reject sequence shapes for a single-row operation.
    pub(crate) fn expect_single(&self, operation: &'static str) -> Result<()> {
        if self.is_single() {
            Ok(())
        } else {
            Err(Error::type_mismatch(operation, "single-row destination", self.shape()))
        }
    }

    /// Reject single-row shapes for a multi-row operation.
    pub(crate) fn expect_many(&self, operation: &'static str) -> Result<()> {
        if self.is_single() {
            Err(Error::type_mismatch(operation, "sequence destination", self.shape()))
        } else {
            Ok(())
        }
    }

    /// Bind at most one row; `false` when there was none.
    pub(crate) fn bind_one(self, meta: &TableMetadata, row: Option<&Row>) -> Result<bool> {
        let Some(row) = row else {
            return Ok(false);
        };
        match self {
            Destination::One(bean) => *bean = bean_from_row(meta, row)?,
            Destination::Scalar(value) => *value = first_value(row),
            Destination::Raw(raw) => *raw = raw_row(row),
            other => {
                return Err(Error::type_mismatch("get", "single-row destination", other.shape()));
            }
        }
        Ok(true)
    }

    /// Bind every row, appending to the destination.
    pub(crate) fn bind_many(self, meta: &TableMetadata, rows: &[Row]) -> Result<()> {
        match self {
            Destination::Many(out) => out.extend(beans_from_rows::<T>(meta, rows)?),
            Destination::Boxed(out) => {
                out.extend(beans_from_rows::<T>(meta, rows)?.into_iter().map(Box::new));
            }
            Destination::Keyed(out) => {
                let keyed = beans_from_rows::<T>(meta, rows)?
                    .into_iter()
                    .map(|bean| Ok((meta.pk_of(&bean)?, bean)))
                    .collect::<Result<Vec<_>>>()?;
                out.extend(keyed);
            }
            Destination::Scalars(out) => out.extend(rows.iter().map(first_value)),
            Destination::RawMany(out) => out.extend(rows.iter().map(raw_row)),
            other => {
                return Err(Error::type_mismatch("find", "sequence destination", other.shape()));
            }
        }
        Ok(())
    }
}

/// Build a fresh bean from a row.
pub fn bean_from_row<T: Bean>(meta: &TableMetadata, row: &Row) -> Result<T> {
    let mut bean = T::default();
    for (name, value) in row.iter() {
        let Some(col) = meta.column(unqualified(name)) else {
            continue;
        };
        bean.set_field_value(col.field_index, value)
            .map_err(|e| with_column(e, &col.name))?;
    }
    Ok(bean)
}

fn beans_from_rows<T: Bean>(meta: &TableMetadata, rows: &[Row]) -> Result<Vec<T>> {
    rows.iter().map(|row| bean_from_row(meta, row)).collect()
}

/// `t.name` -> `name`
fn unqualified(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, col)| col)
}

fn first_value(row: &Row) -> Value {
    row.get(0).cloned().unwrap_or(Value::Null)
}

pub(crate) fn raw_row(row: &Row) -> RawRow {
    row.iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}
