//! SQLite catalog store.
//!
//! # Responsibility
//! - Persist catalog records and channel vectors in a migrated SQLite file.
//! - Keep one transaction open so `commit`/`discard` map onto
//!   `COMMIT`/`ROLLBACK`.
//!
//! # Invariants
//! - Symbols are allocated above every value handed out by this process, so
//!   a rolled-back allocation is never reused.
//! - Numeric samples are stored as little-endian blobs; text samples as a
//!   JSON array.
//! - Dropping the store without `commit` discards pending changes.

use super::{CatalogStore, StoreError, StoreResult};
use crate::db::{create_db, open_db, open_db_in_memory};
use crate::model::channel::{ChannelRecord, DisplayFormat};
use crate::model::element::{ElementType, Samples};
use crate::model::fiducial::Fiducial;
use crate::model::line::{LineCategory, LineRecord, LineType};
use crate::model::symbol::{Symbol, SymbolKind};
use crate::model::vector::ChannelVector;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::cell::Cell;
use std::path::{Path, PathBuf};

const LINE_SELECT_SQL: &str = "SELECT
    s.symbol AS symbol,
    s.name AS name,
    l.category AS category,
    l.line_type AS line_type,
    l.date AS date,
    l.flight AS flight,
    l.number AS number,
    l.version AS version,
    l.group_class AS group_class,
    l.selected AS selected
FROM lines l
JOIN symbols s ON s.symbol = l.symbol";

const CHANNEL_SELECT_SQL: &str = "SELECT
    s.symbol AS symbol,
    s.name AS name,
    c.element_type AS element_type,
    c.array_width AS array_width,
    c.format AS format,
    c.width AS width,
    c.decimals AS decimals,
    c.unit AS unit,
    c.label AS label,
    c.class AS class,
    c.protect AS protect
FROM channels c
JOIN symbols s ON s.symbol = c.symbol";

/// SQLite-backed catalog store.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
    last_symbol: Cell<u64>,
}

impl SqliteStore {
    /// Opens an existing database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        Self::start(open_db(path)?, Some(path.to_path_buf()))
    }

    /// Creates a new database file; fails when it already exists.
    pub fn create(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        Self::start(create_db(path)?, Some(path.to_path_buf()))
    }

    /// Opens a private in-memory SQLite database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::start(open_db_in_memory()?, None)
    }

    fn start(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        let last_symbol: i64 = conn.query_row(
            "SELECT COALESCE(MAX(symbol), 0) FROM symbols;",
            [],
            |row| row.get(0),
        )?;
        let sequence: Option<i64> = conn
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = 'symbols';",
                [],
                |row| row.get(0),
            )
            .optional()?;
        conn.execute_batch("BEGIN;")?;
        Ok(Self {
            conn,
            path,
            last_symbol: Cell::new(last_symbol.max(sequence.unwrap_or(0)).max(0) as u64),
        })
    }

    fn allocate(&self, kind: SymbolKind, name: &str) -> StoreResult<Symbol> {
        let symbol = self.last_symbol.get() + 1;
        self.conn.execute(
            "INSERT INTO symbols (symbol, kind, name) VALUES (?1, ?2, ?3);",
            params![symbol as i64, kind.as_str(), name],
        )?;
        self.last_symbol.set(symbol);
        Ok(Symbol::new(symbol))
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
            warn!("event=store_close module=store status=error error_code=rollback_failed error={err}");
        }
    }
}

impl CatalogStore for SqliteStore {
    fn find_symbol(&self, kind: SymbolKind, name: &str) -> StoreResult<Option<Symbol>> {
        let symbol = self
            .conn
            .query_row(
                "SELECT symbol FROM symbols WHERE kind = ?1 AND name = ?2;",
                params![kind.as_str(), name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(symbol.map(|value| Symbol::new(value as u64)))
    }

    fn symbol_name(&self, kind: SymbolKind, symbol: Symbol) -> StoreResult<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM symbols WHERE kind = ?1 AND symbol = ?2;",
                params![kind.as_str(), symbol.raw() as i64],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(name)
    }

    fn count(&self, kind: SymbolKind) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM symbols WHERE kind = ?1;",
            [kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    fn insert_line(&self, record: &LineRecord) -> StoreResult<Symbol> {
        let symbol = self.allocate(SymbolKind::Line, &record.name)?;
        self.conn.execute(
            "INSERT INTO lines (
                symbol,
                category,
                line_type,
                date,
                flight,
                number,
                version,
                group_class,
                selected
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                symbol.raw() as i64,
                record.category.as_str(),
                line_type_to_db(record.line_type),
                record.date,
                record.flight,
                record.number,
                record.version,
                record.group_class.as_deref(),
                bool_to_int(record.selected),
            ],
        )?;
        Ok(symbol)
    }

    fn line(&self, symbol: Symbol) -> StoreResult<Option<LineRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LINE_SELECT_SQL} WHERE s.symbol = ?1;"))?;
        let mut rows = stmt.query([symbol.raw() as i64])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_line_row(row)?.1)),
            None => Ok(None),
        }
    }

    fn update_line(&self, symbol: Symbol, record: &LineRecord) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE lines
             SET
                category = ?2,
                line_type = ?3,
                date = ?4,
                flight = ?5,
                number = ?6,
                version = ?7,
                group_class = ?8,
                selected = ?9
             WHERE symbol = ?1;",
            params![
                symbol.raw() as i64,
                record.category.as_str(),
                line_type_to_db(record.line_type),
                record.date,
                record.flight,
                record.number,
                record.version,
                record.group_class.as_deref(),
                bool_to_int(record.selected),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::InvalidData(format!("unknown line {symbol}")));
        }
        Ok(())
    }

    fn lines(&self, selected_only: bool) -> StoreResult<Vec<(Symbol, LineRecord)>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LINE_SELECT_SQL} WHERE (?1 = 0 OR l.selected = 1) ORDER BY s.symbol ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(selected_only)])?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            lines.push(parse_line_row(row)?);
        }
        Ok(lines)
    }

    fn insert_channel(&self, record: &ChannelRecord) -> StoreResult<Symbol> {
        let symbol = self.allocate(SymbolKind::Channel, &record.name)?;
        self.conn.execute(
            "INSERT INTO channels (
                symbol,
                element_type,
                array_width,
                format,
                width,
                decimals,
                unit,
                label,
                class,
                protect
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                symbol.raw() as i64,
                record.element_type.as_str(),
                record.array_width,
                record.format.as_str(),
                record.width,
                record.decimals,
                record.unit.as_str(),
                record.label.as_str(),
                record.class.as_str(),
                bool_to_int(record.protect),
            ],
        )?;
        Ok(symbol)
    }

    fn channel(&self, symbol: Symbol) -> StoreResult<Option<ChannelRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CHANNEL_SELECT_SQL} WHERE s.symbol = ?1;"))?;
        let mut rows = stmt.query([symbol.raw() as i64])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_channel_row(row)?.1)),
            None => Ok(None),
        }
    }

    fn update_channel(&self, symbol: Symbol, record: &ChannelRecord) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE channels
             SET
                format = ?2,
                width = ?3,
                decimals = ?4,
                unit = ?5,
                label = ?6,
                class = ?7,
                protect = ?8
             WHERE symbol = ?1;",
            params![
                symbol.raw() as i64,
                record.format.as_str(),
                record.width,
                record.decimals,
                record.unit.as_str(),
                record.label.as_str(),
                record.class.as_str(),
                bool_to_int(record.protect),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::InvalidData(format!("unknown channel {symbol}")));
        }
        Ok(())
    }

    fn channels(&self) -> StoreResult<Vec<(Symbol, ChannelRecord)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CHANNEL_SELECT_SQL} ORDER BY s.symbol ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut channels = Vec::new();
        while let Some(row) = rows.next()? {
            channels.push(parse_channel_row(row)?);
        }
        Ok(channels)
    }

    fn delete_symbol(&self, kind: SymbolKind, symbol: Symbol) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM symbols WHERE kind = ?1 AND symbol = ?2;",
            params![kind.as_str(), symbol.raw() as i64],
        )?;
        debug!(
            "event=symbol_delete module=store status=ok kind={} symbol={} deleted={}",
            kind.as_str(),
            symbol.raw(),
            changed
        );
        Ok(changed > 0)
    }

    fn vector(&self, line: Symbol, channel: Symbol) -> StoreResult<Option<ChannelVector>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                fid_start,
                fid_increment,
                width,
                element_type,
                sample_count,
                samples
             FROM channel_data
             WHERE line_symbol = ?1 AND channel_symbol = ?2;",
        )?;
        let mut rows = stmt.query(params![line.raw() as i64, channel.raw() as i64])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_vector_row(row)?)),
            None => Ok(None),
        }
    }

    fn put_vector(
        &self,
        line: Symbol,
        channel: Symbol,
        vector: &ChannelVector,
    ) -> StoreResult<()> {
        let blob = encode_samples(&vector.samples)?;
        self.conn.execute(
            "INSERT INTO channel_data (
                line_symbol,
                channel_symbol,
                fid_start,
                fid_increment,
                width,
                element_type,
                sample_count,
                samples
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (line_symbol, channel_symbol) DO UPDATE SET
                fid_start = excluded.fid_start,
                fid_increment = excluded.fid_increment,
                width = excluded.width,
                element_type = excluded.element_type,
                sample_count = excluded.sample_count,
                samples = excluded.samples;",
            params![
                line.raw() as i64,
                channel.raw() as i64,
                vector.fiducial.map(|fid| fid.start()),
                vector.fiducial.map(|fid| fid.increment()),
                vector.width,
                vector.samples.element_type().as_str(),
                vector.samples.len() as i64,
                blob,
            ],
        )?;
        Ok(())
    }

    fn property(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM properties WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_property(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO properties (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value;",
            [key, value],
        )?;
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT; BEGIN;")?;
        Ok(())
    }

    fn discard(&self) -> StoreResult<()> {
        self.conn.execute_batch("ROLLBACK; BEGIN;")?;
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        self.path.clone()
    }
}

fn parse_line_row(row: &Row<'_>) -> StoreResult<(Symbol, LineRecord)> {
    let symbol = Symbol::new(row.get::<_, i64>("symbol")? as u64);

    let category_text: String = row.get("category")?;
    let category = LineCategory::parse(&category_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid line category `{category_text}` in lines.category"))
    })?;

    let type_text: String = row.get("line_type")?;
    let line_type = parse_line_type(&type_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid line type `{type_text}` in lines.line_type"))
    })?;

    let record = LineRecord {
        name: row.get("name")?,
        category,
        line_type,
        date: row.get("date")?,
        flight: row.get("flight")?,
        number: row.get("number")?,
        version: row.get("version")?,
        group_class: row.get("group_class")?,
        selected: int_to_bool(row.get("selected")?, "lines.selected")?,
    };
    Ok((symbol, record))
}

fn parse_channel_row(row: &Row<'_>) -> StoreResult<(Symbol, ChannelRecord)> {
    let symbol = Symbol::new(row.get::<_, i64>("symbol")? as u64);

    let type_text: String = row.get("element_type")?;
    let element_type = ElementType::parse(&type_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid element type `{type_text}` in channels.element_type"
        ))
    })?;

    let format_text: String = row.get("format")?;
    let format = DisplayFormat::parse(&format_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid format `{format_text}` in channels.format"))
    })?;

    let record = ChannelRecord {
        name: row.get("name")?,
        element_type,
        array_width: row.get("array_width")?,
        format,
        width: row.get("width")?,
        decimals: row.get("decimals")?,
        unit: row.get("unit")?,
        label: row.get("label")?,
        class: row.get("class")?,
        protect: int_to_bool(row.get("protect")?, "channels.protect")?,
    };
    Ok((symbol, record))
}

fn parse_vector_row(row: &Row<'_>) -> StoreResult<ChannelVector> {
    let start: Option<f64> = row.get("fid_start")?;
    let increment: Option<f64> = row.get("fid_increment")?;
    let fiducial = match (start, increment) {
        (Some(start), Some(increment)) => Some(Fiducial::new(start, increment).map_err(|err| {
            StoreError::InvalidData(format!("{err} in channel_data fiducial"))
        })?),
        _ => None,
    };

    let type_text: String = row.get("element_type")?;
    let element_type = ElementType::parse(&type_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid element type `{type_text}` in channel_data.element_type"
        ))
    })?;
    let count: i64 = row.get("sample_count")?;
    let blob: Vec<u8> = row.get("samples")?;
    let samples = decode_samples(element_type, count.max(0) as usize, &blob)?;

    Ok(ChannelVector {
        fiducial,
        width: row.get("width")?,
        samples,
    })
}

fn encode_samples(samples: &Samples) -> StoreResult<Vec<u8>> {
    Ok(match samples {
        Samples::Short(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        Samples::Long(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        Samples::Long64(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        Samples::Float(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        Samples::Double(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        Samples::Text(values) => serde_json::to_vec(values)?,
    })
}

fn decode_samples(element_type: ElementType, count: usize, blob: &[u8]) -> StoreResult<Samples> {
    let samples = match element_type {
        ElementType::Short => Samples::Short(decode_fixed(blob, count, i16::from_le_bytes)?),
        ElementType::Long => Samples::Long(decode_fixed(blob, count, i32::from_le_bytes)?),
        ElementType::Long64 => Samples::Long64(decode_fixed(blob, count, i64::from_le_bytes)?),
        ElementType::Float => Samples::Float(decode_fixed(blob, count, f32::from_le_bytes)?),
        ElementType::Double => Samples::Double(decode_fixed(blob, count, f64::from_le_bytes)?),
        ElementType::Text => {
            let values: Vec<String> = serde_json::from_slice(blob)?;
            if values.len() != count {
                return Err(StoreError::InvalidData(format!(
                    "text sample count {} does not match recorded {count}",
                    values.len()
                )));
            }
            Samples::Text(values)
        }
    };
    Ok(samples)
}

fn decode_fixed<const N: usize, T>(
    blob: &[u8],
    count: usize,
    from_bytes: fn([u8; N]) -> T,
) -> StoreResult<Vec<T>> {
    if blob.len() != count * N {
        return Err(StoreError::InvalidData(format!(
            "sample blob of {} bytes does not hold {count} samples of {N} bytes",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0_u8; N];
            bytes.copy_from_slice(chunk);
            from_bytes(bytes)
        })
        .collect())
}

fn line_type_to_db(line_type: LineType) -> &'static str {
    match line_type {
        LineType::Normal => "normal",
        LineType::Base => "base",
        LineType::Tie => "tie",
        LineType::Test => "test",
        LineType::Trend => "trend",
        LineType::Special => "special",
        LineType::Random => "random",
    }
}

fn parse_line_type(value: &str) -> Option<LineType> {
    match value {
        "normal" => Some(LineType::Normal),
        "base" => Some(LineType::Base),
        "tie" => Some(LineType::Tie),
        "test" => Some(LineType::Test),
        "trend" => Some(LineType::Trend),
        "special" => Some(LineType::Special),
        "random" => Some(LineType::Random),
        _ => None,
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(value: i64, column: &str) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
