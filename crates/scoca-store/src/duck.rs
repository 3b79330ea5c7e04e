//! DuckDB persistence for case filings, opinions and concurrences.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime};
use duckdb::{Connection, OptionalExt, params};
use scoca_core::{
    CaseFiling, CoreError, FilingFlags, OpinionRow, OpinionType, ResolvedOpinion, Roster,
    docket_sort_key,
};
use tracing::{debug, info};

use crate::StoreError;

/// Tables, in creation order. Referential order between them is enforced by
/// [`DuckStore`] itself rather than by `FOREIGN KEY` clauses: DuckDB cannot
/// update a row that a foreign key references.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS justices (
    shorthand   VARCHAR PRIMARY KEY,
    short_name  VARCHAR NOT NULL,
    full_name   VARCHAR NOT NULL,
    position    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS opinion_types (
    id    INTEGER PRIMARY KEY,
    name  VARCHAR NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS case_filings (
    docket_number        VARCHAR PRIMARY KEY,
    url                  VARCHAR,
    plain_text           VARCHAR NOT NULL,
    sha1                 VARCHAR,
    filed_on             DATE,
    ends_in_letter_flag  BOOLEAN NOT NULL DEFAULT false,
    no_opinions_flag     BOOLEAN NOT NULL DEFAULT false,
    exclude_from_chart   BOOLEAN NOT NULL DEFAULT false,
    added_on             TIMESTAMP NOT NULL DEFAULT current_timestamp
);

CREATE SEQUENCE IF NOT EXISTS opinion_id_seq START 1;

CREATE TABLE IF NOT EXISTS opinions (
    id                    BIGINT PRIMARY KEY DEFAULT nextval('opinion_id_seq'),
    docket_number         VARCHAR NOT NULL,
    type_id               INTEGER NOT NULL,
    effective_type_id     INTEGER,
    authoring_justice     VARCHAR NOT NULL,
    effective_type_flag   BOOLEAN NOT NULL DEFAULT false,
    no_concurrences_flag  BOOLEAN NOT NULL DEFAULT false
);

CREATE TABLE IF NOT EXISTS concurrences (
    opinion_id  BIGINT NOT NULL,
    justice     VARCHAR NOT NULL,
    PRIMARY KEY (opinion_id, justice)
);

CREATE TABLE IF NOT EXISTS ingest_runs (
    finished_at  TIMESTAMP NOT NULL,
    fetched      INTEGER NOT NULL,
    inserted     INTEGER NOT NULL
);
";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ordered read-back feeding the agreement aggregator. One row per
/// (opinion, concurring justice); an opinion nobody joined yields one row
/// with a NULL `concurring_justice`. Flagged and excluded filings are left
/// out.
const OPINION_ROWS: &str = "
SELECT o.docket_number,
       o.id AS opinion_id,
       o.type_id,
       o.effective_type_id,
       o.authoring_justice,
       c.justice AS concurring_justice
FROM opinions o
JOIN case_filings f ON f.docket_number = o.docket_number
LEFT JOIN concurrences c ON c.opinion_id = o.id
WHERE NOT (f.ends_in_letter_flag OR f.no_opinions_flag OR f.exclude_from_chart)
ORDER BY o.docket_number, o.type_id, o.authoring_justice, o.id, c.justice
";

/// A case filing held back from the chart, with the reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggedFiling {
    pub docket_number: String,
    pub url: Option<String>,
    pub flags: FilingFlags,
}

/// A concurring-and-dissenting opinion still waiting for an effective type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedOpinion {
    pub id: i64,
    pub docket_number: String,
    pub authoring_justice: String,
    pub url: Option<String>,
}

/// DuckDB store for the opinion database.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and
/// [`open_persistent`](Self::open_persistent) for a database that survives
/// across runs. Call [`init_schema`](Self::init_schema) after opening.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Create missing tables and seed `opinion_types`. Safe to call on an
    /// existing database.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        for t in OpinionType::ALL {
            self.conn.execute(
                "INSERT OR IGNORE INTO opinion_types (id, name) VALUES (?, ?)",
                params![t.code(), t.as_str()],
            )?;
        }
        debug!("schema ready");
        Ok(())
    }

    /// Check whether the opinion tables exist.
    pub fn has_tables(&self) -> bool {
        self.case_filing_count().is_ok() && self.opinion_count().is_ok()
    }

    /// Upsert every roster justice along with its roster position.
    pub fn load_roster(&self, roster: &Roster) -> Result<(), StoreError> {
        for (position, j) in roster.justices().iter().enumerate() {
            self.conn.execute(
                "INSERT OR REPLACE INTO justices (shorthand, short_name, full_name, position)
                 VALUES (?, ?, ?, ?)",
                params![j.shorthand, j.short_name, j.full_name, position as i32],
            )?;
        }
        info!(count = roster.len(), "loaded justice roster");
        Ok(())
    }

    // ── Case filings ──

    pub fn has_case_filing(&self, docket_number: &str) -> Result<bool, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT count(*) FROM case_filings WHERE docket_number = ?",
            params![docket_number],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    /// Store a new case filing. Returns `false`, leaving the stored row
    /// untouched, when the docket number already exists.
    pub fn insert_case_filing(
        &self,
        filing: &CaseFiling,
        flags: FilingFlags,
    ) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT INTO case_filings
                 (docket_number, url, plain_text, sha1, filed_on,
                  ends_in_letter_flag, no_opinions_flag, exclude_from_chart)
             VALUES (?, ?, ?, ?, CAST(? AS DATE), ?, ?, ?)
             ON CONFLICT DO NOTHING",
            params![
                filing.docket_number,
                filing.url,
                filing.plain_text,
                filing.sha1,
                filing.filed_on.map(|d| d.to_string()),
                flags.ends_in_letter,
                flags.no_opinions,
                flags.exclude_from_chart,
            ],
        )?;
        if inserted == 0 {
            debug!(docket_number = %filing.docket_number, "case filing already stored");
        }
        Ok(inserted > 0)
    }

    pub fn case_filing(&self, docket_number: &str) -> Result<CaseFiling, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT docket_number, url, plain_text, sha1, strftime(filed_on, '%Y-%m-%d')
                 FROM case_filings WHERE docket_number = ?",
                params![docket_number],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, Option<String>>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, Option<String>>(3)?,
                        r.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::UnknownFiling(docket_number.to_string()))?;
        let (docket_number, url, plain_text, sha1, filed_on) = row;
        let filed_on = filed_on
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
            .transpose()
            .map_err(|e| StoreError::Other(format!("filed_on: {e}")))?;
        Ok(CaseFiling {
            docket_number,
            url,
            plain_text,
            sha1,
            filed_on,
        })
    }

    /// Set or clear the manual exclusion of a filing from the chart.
    pub fn set_excluded(&self, docket_number: &str, excluded: bool) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE case_filings SET exclude_from_chart = ? WHERE docket_number = ?",
            params![excluded, docket_number],
        )?;
        if updated == 0 {
            return Err(StoreError::UnknownFiling(docket_number.to_string()));
        }
        info!(docket_number, excluded, "updated chart exclusion");
        Ok(())
    }

    pub fn filing_flags(&self, docket_number: &str) -> Result<FilingFlags, StoreError> {
        self.conn
            .query_row(
                "SELECT ends_in_letter_flag, no_opinions_flag, exclude_from_chart
                 FROM case_filings WHERE docket_number = ?",
                params![docket_number],
                |r| {
                    Ok(FilingFlags {
                        ends_in_letter: r.get(0)?,
                        no_opinions: r.get(1)?,
                        exclude_from_chart: r.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::UnknownFiling(docket_number.to_string()))
    }

    /// Overwrite every review flag of a filing, e.g. to clear
    /// `no_opinions` once its opinions were entered by hand.
    pub fn set_flags(&self, docket_number: &str, flags: FilingFlags) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE case_filings
             SET ends_in_letter_flag = ?, no_opinions_flag = ?, exclude_from_chart = ?
             WHERE docket_number = ?",
            params![
                flags.ends_in_letter,
                flags.no_opinions,
                flags.exclude_from_chart,
                docket_number
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::UnknownFiling(docket_number.to_string()));
        }
        info!(docket_number, ?flags, "updated review flags");
        Ok(())
    }

    /// Filings carrying any review flag, in numeric docket order.
    pub fn flagged_filings(&self) -> Result<Vec<FlaggedFiling>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT docket_number, url, ends_in_letter_flag, no_opinions_flag, exclude_from_chart
             FROM case_filings
             WHERE ends_in_letter_flag OR no_opinions_flag OR exclude_from_chart",
        )?;
        let mut rows = stmt
            .query_map([], |r| {
                Ok(FlaggedFiling {
                    docket_number: r.get(0)?,
                    url: r.get(1)?,
                    flags: FilingFlags {
                        ends_in_letter: r.get(2)?,
                        no_opinions: r.get(3)?,
                        exclude_from_chart: r.get(4)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort_by_cached_key(|f| docket_sort_key(&f.docket_number));
        Ok(rows)
    }

    // ── Opinions ──

    /// Store the opinions of an already stored filing, in one transaction.
    ///
    /// Each opinion row is written before its concurrences so that a
    /// concurrence never refers to a missing opinion. Returns the generated
    /// opinion ids in input order.
    pub fn save_opinions(
        &mut self,
        docket_number: &str,
        opinions: &[ResolvedOpinion],
    ) -> Result<Vec<i64>, StoreError> {
        if !self.has_case_filing(docket_number)? {
            return Err(StoreError::UnknownFiling(docket_number.to_string()));
        }
        for justice in opinions
            .iter()
            .flat_map(|o| std::iter::once(&o.author).chain(&o.concurring))
        {
            if !self.has_justice(justice)? {
                return Err(StoreError::UnknownJustice(justice.clone()));
            }
        }

        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(opinions.len());
        for opinion in opinions {
            let id: i64 = tx.query_row(
                "INSERT INTO opinions
                     (docket_number, type_id, effective_type_id, authoring_justice,
                      effective_type_flag, no_concurrences_flag)
                 VALUES (?, ?, ?, ?, ?, ?)
                 RETURNING id",
                params![
                    docket_number,
                    opinion.kind.code(),
                    opinion.effective_type.map(OpinionType::code),
                    opinion.author,
                    opinion.effective_type.is_none(),
                    opinion.concurring.is_empty(),
                ],
                |r| r.get(0),
            )?;
            for justice in &opinion.concurring {
                tx.execute(
                    "INSERT INTO concurrences (opinion_id, justice) VALUES (?, ?)
                     ON CONFLICT DO NOTHING",
                    params![id, justice],
                )?;
            }
            ids.push(id);
        }
        tx.commit()?;
        debug!(docket_number, count = ids.len(), "saved opinions");
        Ok(ids)
    }

    /// Add one opinion, entered by hand, to a stored filing.
    ///
    /// A filing keeps a single majority: adding a second one fails with
    /// [`StoreError::MajorityExists`].
    pub fn add_opinion(
        &mut self,
        docket_number: &str,
        opinion: &ResolvedOpinion,
    ) -> Result<i64, StoreError> {
        if opinion.kind == OpinionType::Majority
            && let Some(existing) = self.majority_id(docket_number)?
        {
            return Err(StoreError::MajorityExists {
                docket_number: docket_number.to_string(),
                opinion_id: existing,
            });
        }
        let ids = self.save_opinions(docket_number, std::slice::from_ref(opinion))?;
        let id = ids.first().copied().ok_or(StoreError::NoResults)?;
        info!(docket_number, opinion_id = id, kind = %opinion.kind, "added opinion");
        Ok(id)
    }

    fn majority_id(&self, docket_number: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT min(id) FROM opinions WHERE docket_number = ? AND type_id = ?",
                params![docket_number, OpinionType::Majority.code()],
                |r| r.get::<_, Option<i64>>(0),
            )?)
    }

    /// Resolve a concurring-and-dissenting opinion to concurring or
    /// dissenting.
    pub fn set_effective_type(
        &self,
        opinion_id: i64,
        effective_type: OpinionType,
    ) -> Result<(), StoreError> {
        let type_id: i64 = self
            .conn
            .query_row(
                "SELECT type_id::BIGINT FROM opinions WHERE id = ?",
                params![opinion_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownOpinion(opinion_id))?;
        let kind = OpinionType::from_code(type_id)?;
        if kind != OpinionType::ConcurringAndDissenting || !effective_type.is_stance() {
            return Err(CoreError::InvalidEffectiveType {
                kind,
                effective: effective_type,
            }
            .into());
        }
        self.conn.execute(
            "UPDATE opinions SET effective_type_id = ?, effective_type_flag = false WHERE id = ?",
            params![effective_type.code(), opinion_id],
        )?;
        info!(opinion_id, effective_type = %effective_type, "resolved effective type");
        Ok(())
    }

    /// Concurring-and-dissenting opinions with no effective type yet.
    pub fn unresolved_opinions(&self) -> Result<Vec<UnresolvedOpinion>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT o.id, o.docket_number, o.authoring_justice, f.url
             FROM opinions o
             JOIN case_filings f ON f.docket_number = o.docket_number
             WHERE o.type_id = ? AND o.effective_type_id IS NULL
             ORDER BY o.docket_number, o.id",
        )?;
        let rows = stmt
            .query_map(params![OpinionType::ConcurringAndDissenting.code()], |r| {
                Ok(UnresolvedOpinion {
                    id: r.get(0)?,
                    docket_number: r.get(1)?,
                    authoring_justice: r.get(2)?,
                    url: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The ordered opinion/concurrence read-back as Arrow batches.
    pub fn opinion_rows_arrow(&self) -> Result<Vec<RecordBatch>, StoreError> {
        self.query_arrow(OPINION_ROWS)
    }

    /// The ordered opinion/concurrence read-back, decoded.
    pub fn opinion_rows(&self) -> Result<Vec<OpinionRow>, StoreError> {
        let mut rows = Vec::new();
        for batch in self.opinion_rows_arrow()? {
            rows.extend(scoca_core::rows_from_batch(&batch)?);
        }
        Ok(rows)
    }

    // ── Ingest runs ──

    /// Remember a completed docket walk.
    pub fn record_ingest_run(
        &self,
        finished_at: NaiveDateTime,
        fetched: usize,
        inserted: usize,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO ingest_runs (finished_at, fetched, inserted)
             VALUES (CAST(? AS TIMESTAMP), ?, ?)",
            params![
                finished_at.format(TIMESTAMP_FORMAT).to_string(),
                fetched as i64,
                inserted as i64
            ],
        )?;
        Ok(())
    }

    /// When the most recent completed docket walk finished, if any.
    pub fn last_ingest_run(&self) -> Result<Option<NaiveDateTime>, StoreError> {
        let last: Option<String> = self.conn.query_row(
            "SELECT strftime(max(finished_at), '%Y-%m-%d %H:%M:%S') FROM ingest_runs",
            [],
            |r| r.get(0),
        )?;
        last.map(|t| NaiveDateTime::parse_from_str(&t, TIMESTAMP_FORMAT))
            .transpose()
            .map_err(|e| StoreError::Other(format!("finished_at: {e}")))
    }

    fn has_justice(&self, shorthand: &str) -> Result<bool, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT count(*) FROM justices WHERE shorthand = ?",
            params![shorthand],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    // ── Counts ──

    pub fn case_filing_count(&self) -> Result<usize, StoreError> {
        self.count_table("case_filings")
    }

    pub fn opinion_count(&self) -> Result<usize, StoreError> {
        self.count_table("opinions")
    }

    pub fn concurrence_count(&self) -> Result<usize, StoreError> {
        self.count_table("concurrences")
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let batches = self.query_arrow(&sql)?;
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    // ── Escape hatch ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}
