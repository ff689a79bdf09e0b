//! Lazy, single-pass iteration over query results.
//!
//! A [`RecordCursor`] decodes one row per [`RecordCursor::advance`]. It closes itself,
//! releasing its connection, as soon as the underlying rows run out, and it closes on
//! drop. Calling [`RecordCursor::close`] more than once is harmless.
//!
//! The cursor is also an [`Iterator`] of `Result<T, DatabaseError>`, which is usually
//! the more convenient way to consume it.

use std::{fmt, marker::PhantomData, sync::Arc};

use thiserror::Error;

use crate::{
    DatabaseError, Message, Row,
    codec::{self, CorruptRecordError},
    connection::RowSource,
    id::{IdKind, Identifier},
    observer::Observer,
};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
    #[error("Cursor has not been advanced to a row")]
    NotPositioned,
    #[error("Cursor is exhausted")]
    Exhausted,
    #[error("Cursor is closed")]
    Closed,
}

/// Turns a row into the value a cursor yields.
pub trait RowDecoder<T>: Send {
    /// # Errors
    ///
    /// * If the row does not hold a valid value
    fn decode(&self, row: &Row) -> Result<T, CorruptRecordError>;
}

/// Decodes the serialized record held in the payload column.
pub struct PayloadDecoder<R> {
    column: String,
    _record: PhantomData<fn() -> R>,
}

impl<R> PayloadDecoder<R> {
    #[must_use]
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            _record: PhantomData,
        }
    }
}

impl<R: Message> RowDecoder<R> for PayloadDecoder<R> {
    fn decode(&self, row: &Row) -> Result<R, CorruptRecordError> {
        let value = row
            .value(&self.column)
            .ok_or_else(|| CorruptRecordError::MissingColumn(self.column.clone()))?;

        codec::decode_payload(&self.column, value)
    }
}

/// Decodes the identifier held in the id column.
pub struct IdDecoder {
    column: String,
    kind: IdKind,
}

impl IdDecoder {
    #[must_use]
    pub fn new(column: impl Into<String>, kind: IdKind) -> Self {
        Self {
            column: column.into(),
            kind,
        }
    }
}

impl RowDecoder<Identifier> for IdDecoder {
    fn decode(&self, row: &Row) -> Result<Identifier, CorruptRecordError> {
        let value = row
            .value(&self.column)
            .ok_or_else(|| CorruptRecordError::MissingColumn(self.column.clone()))?;

        codec::decode_id(self.kind, &self.column, value)
    }
}

enum CursorState {
    Fresh,
    Positioned(Row),
    Exhausted,
    Closed,
}

pub struct RecordCursor<T> {
    table: String,
    source: Option<Box<dyn RowSource>>,
    decoder: Box<dyn RowDecoder<T>>,
    observer: Option<Arc<dyn Observer>>,
    state: CursorState,
    rows_read: usize,
}

impl<T> RecordCursor<T> {
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        source: Box<dyn RowSource>,
        decoder: Box<dyn RowDecoder<T>>,
        observer: Option<Arc<dyn Observer>>,
    ) -> Self {
        Self {
            table: table.into(),
            source: Some(source),
            decoder,
            observer,
            state: CursorState::Fresh,
            rows_read: 0,
        }
    }

    /// A cursor with no rows, backed by no connection.
    #[must_use]
    pub fn empty(table: impl Into<String>, decoder: Box<dyn RowDecoder<T>>) -> Self {
        Self {
            table: table.into(),
            source: None,
            decoder,
            observer: None,
            state: CursorState::Fresh,
            rows_read: 0,
        }
    }

    /// Moves to the next row. Returns `false`, and closes the cursor, once no rows
    /// remain.
    ///
    /// # Errors
    ///
    /// * If the cursor was already exhausted or closed
    /// * If the next row cannot be read
    pub fn advance(&mut self) -> Result<bool, DatabaseError> {
        match self.state {
            CursorState::Exhausted | CursorState::Closed => {
                return Err(CursorError::Closed.into());
            }
            CursorState::Fresh | CursorState::Positioned(_) => {}
        }

        let next = match self.source.as_mut() {
            Some(source) => source.next_row(),
            None => Ok(None),
        };

        match next {
            Ok(Some(row)) => {
                self.rows_read += 1;
                self.state = CursorState::Positioned(row);
                Ok(true)
            }
            Ok(None) => {
                self.release()?;
                self.state = CursorState::Exhausted;
                Ok(false)
            }
            Err(source) => {
                let _ = self.release();
                self.state = CursorState::Closed;
                Err(DatabaseError::Statement {
                    sql: format!("<cursor over {}>", self.table),
                    source,
                })
            }
        }
    }

    /// Decodes the row the cursor is positioned on.
    ///
    /// # Errors
    ///
    /// * If [`RecordCursor::advance`] has not returned `true` yet
    /// * If the cursor is exhausted or closed
    /// * If the row does not decode
    pub fn current(&self) -> Result<T, DatabaseError> {
        match &self.state {
            CursorState::Fresh => Err(CursorError::NotPositioned.into()),
            CursorState::Exhausted => Err(CursorError::Exhausted.into()),
            CursorState::Closed => Err(CursorError::Closed.into()),
            CursorState::Positioned(row) => Ok(self.decoder.decode(row)?),
        }
    }

    /// Releases the connection early.
    ///
    /// # Errors
    ///
    /// * If the connection fails to release
    pub fn close(&mut self) -> Result<(), DatabaseError> {
        if matches!(self.state, CursorState::Closed) {
            return Ok(());
        }

        self.state = CursorState::Closed;
        self.release()
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, CursorState::Exhausted | CursorState::Closed)
    }

    /// Drains the remaining records.
    ///
    /// # Errors
    ///
    /// * If any row fails to read or decode
    pub fn into_vec(self) -> Result<Vec<T>, DatabaseError> {
        self.collect()
    }

    fn release(&mut self) -> Result<(), DatabaseError> {
        let Some(mut source) = self.source.take() else {
            return Ok(());
        };

        if let Some(observer) = &self.observer {
            observer.on_rows(&self.table, self.rows_read);
        }

        source.close().map_err(|source| DatabaseError::Statement {
            sql: format!("<close cursor over {}>", self.table),
            source,
        })
    }
}

impl<T> Iterator for RecordCursor<T> {
    type Item = Result<T, DatabaseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_closed() {
            return None;
        }

        match self.advance() {
            Ok(true) => {
                let item = self.current();
                if item.is_err() {
                    let _ = self.close();
                }
                Some(item)
            }
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<T> Drop for RecordCursor<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close cursor over '{}': {e:?}", self.table);
        }
    }
}

impl<T> fmt::Debug for RecordCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            CursorState::Fresh => "fresh",
            CursorState::Positioned(_) => "positioned",
            CursorState::Exhausted => "exhausted",
            CursorState::Closed => "closed",
        };

        f.debug_struct("RecordCursor")
            .field("table", &self.table)
            .field("state", &state)
            .field("rows_read", &self.rows_read)
            .finish_non_exhaustive()
    }
}
