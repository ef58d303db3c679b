use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{named_params, params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{
    ChiefEvalExtra, EvalExtra, FitrepExtra, PromotionRecommendation, Report, ReportKind,
    ReportType,
};

const COLUMNS: &str = "id, doc_type, name, rate, desig, ssn, summary_group, uic, station,
    promotion_status, date_reported, periodic, det_indiv, special, period_start, period_end,
    not_observed, regular, concurrent, billet_subcategory, senior_name, senior_grade,
    senior_desig, senior_title, senior_uic, senior_ssn, senior_address, job,
    duties_abbreviation, duties_description, date_counseled, counselor, career_rec_1,
    career_rec_2, comments, indiv_promo_rec, extra";

/// SQLite store of reports. Each operation opens its own connection.
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Points at `path`; nothing touches the filesystem until `init`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.path)
            .with_context(|| format!("Failed to open database: {}", self.path.display()))
    }

    pub fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }
        self.connect()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_type TEXT NOT NULL CHECK (doc_type IN ('fitrep', 'eval', 'chiefeval')),
                name TEXT NOT NULL DEFAULT '',
                rate TEXT NOT NULL DEFAULT '',
                desig TEXT NOT NULL DEFAULT '',
                ssn TEXT NOT NULL DEFAULT '',
                summary_group TEXT,
                uic TEXT NOT NULL DEFAULT '',
                station TEXT NOT NULL DEFAULT '',
                promotion_status TEXT,
                date_reported TEXT,
                periodic INTEGER NOT NULL DEFAULT 0,
                det_indiv INTEGER NOT NULL DEFAULT 0,
                special INTEGER NOT NULL DEFAULT 0,
                period_start TEXT,
                period_end TEXT,
                not_observed INTEGER NOT NULL DEFAULT 0,
                regular INTEGER NOT NULL DEFAULT 0,
                concurrent INTEGER NOT NULL DEFAULT 0,
                billet_subcategory TEXT,
                senior_name TEXT NOT NULL DEFAULT '',
                senior_grade TEXT NOT NULL DEFAULT '',
                senior_desig TEXT NOT NULL DEFAULT '',
                senior_title TEXT NOT NULL DEFAULT '',
                senior_uic TEXT NOT NULL DEFAULT '',
                senior_ssn TEXT NOT NULL DEFAULT '',
                senior_address TEXT NOT NULL DEFAULT '',
                job TEXT NOT NULL DEFAULT '',
                duties_abbreviation TEXT NOT NULL DEFAULT '',
                duties_description TEXT NOT NULL DEFAULT '',
                date_counseled TEXT,
                counselor TEXT NOT NULL DEFAULT '',
                career_rec_1 TEXT NOT NULL DEFAULT '',
                career_rec_2 TEXT NOT NULL DEFAULT '',
                comments TEXT NOT NULL DEFAULT '',
                indiv_promo_rec INTEGER CHECK (indiv_promo_rec BETWEEN 0 AND 5),
                extra TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_reports_doc_type ON reports(doc_type);
            CREATE INDEX IF NOT EXISTS idx_reports_senior ON reports(senior_name, period_end);
            "#,
        )?;
        info!(path = %self.path.display(), "database initialized");
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.exists() {
            return Err(anyhow!(
                "Database not initialized. Run 'navfitx init' first."
            ));
        }
        let tables: i64 = self.connect()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='reports'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'navfitx init' first."
            ));
        }
        Ok(())
    }

    /// Inserts `report` as a new row and returns its id.
    pub fn insert_report(&self, report: &Report) -> Result<i64> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        write_report(
            &tx,
            "INSERT INTO reports (
                id, doc_type, name, rate, desig, ssn, summary_group, uic, station,
                promotion_status, date_reported, periodic, det_indiv, special, period_start,
                period_end, not_observed, regular, concurrent, billet_subcategory, senior_name,
                senior_grade, senior_desig, senior_title, senior_uic, senior_ssn, senior_address,
                job, duties_abbreviation, duties_description, date_counseled, counselor,
                career_rec_1, career_rec_2, comments, indiv_promo_rec, extra
            ) VALUES (
                :id, :doc_type, :name, :rate, :desig, :ssn, :summary_group, :uic, :station,
                :promotion_status, :date_reported, :periodic, :det_indiv, :special, :period_start,
                :period_end, :not_observed, :regular, :concurrent, :billet_subcategory, :senior_name,
                :senior_grade, :senior_desig, :senior_title, :senior_uic, :senior_ssn, :senior_address,
                :job, :duties_abbreviation, :duties_description, :date_counseled, :counselor,
                :career_rec_1, :career_rec_2, :comments, :indiv_promo_rec, :extra
            )",
            report,
            None,
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        debug!(id, doc_type = report.report_type().tag(), "inserted report");
        Ok(id)
    }

    /// Overwrites the row `report.id` points at.
    pub fn update_report(&self, report: &Report) -> Result<()> {
        let id = report
            .id
            .ok_or_else(|| anyhow!("Cannot update a report that has no id"))?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let changed = write_report(
            &tx,
            "UPDATE reports SET
                doc_type = :doc_type, name = :name, rate = :rate, desig = :desig, ssn = :ssn,
                summary_group = :summary_group, uic = :uic, station = :station,
                promotion_status = :promotion_status, date_reported = :date_reported,
                periodic = :periodic, det_indiv = :det_indiv, special = :special,
                period_start = :period_start, period_end = :period_end,
                not_observed = :not_observed, regular = :regular, concurrent = :concurrent,
                billet_subcategory = :billet_subcategory, senior_name = :senior_name,
                senior_grade = :senior_grade, senior_desig = :senior_desig,
                senior_title = :senior_title, senior_uic = :senior_uic,
                senior_ssn = :senior_ssn, senior_address = :senior_address, job = :job,
                duties_abbreviation = :duties_abbreviation,
                duties_description = :duties_description, date_counseled = :date_counseled,
                counselor = :counselor, career_rec_1 = :career_rec_1,
                career_rec_2 = :career_rec_2, comments = :comments,
                indiv_promo_rec = :indiv_promo_rec, extra = :extra,
                updated_at = datetime('now')
             WHERE id = :id",
            report,
            Some(id),
        )?;
        if changed == 0 {
            return Err(anyhow!("No report with id {}", id));
        }
        tx.commit()?;
        debug!(id, "updated report");
        Ok(())
    }

    /// Updates when the report carries an id, inserts otherwise. Returns the id.
    pub fn save_report(&self, report: &Report) -> Result<i64> {
        match report.id {
            Some(id) => {
                self.update_report(report)?;
                Ok(id)
            }
            None => self.insert_report(report),
        }
    }

    pub fn get_report(&self, id: i64) -> Result<Option<Report>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM reports WHERE id = ?1", COLUMNS),
                [id],
                Self::row_to_report_row,
            )
            .optional()?;
        row.map(ReportRow::into_report)
            .transpose()
            .with_context(|| format!("Stored report {} is corrupt", id))
    }

    pub fn list_reports(&self, report_type: Option<ReportType>) -> Result<Vec<Report>> {
        let conn = self.connect()?;
        let mut sql = format!("SELECT {} FROM reports", COLUMNS);
        if report_type.is_some() {
            sql.push_str(" WHERE doc_type = ?1");
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(t) = report_type {
            stmt.query_map([t.tag()], Self::row_to_report_row)?
        } else {
            stmt.query_map([], Self::row_to_report_row)?
        };

        let rows = rows
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list reports")?;
        rows.into_iter().map(ReportRow::into_report).collect()
    }

    /// Returns false when there was no such report.
    pub fn delete_report(&self, id: i64) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM reports WHERE id = ?1", params![id])?;
        tx.commit()?;
        debug!(id, deleted, "delete report");
        Ok(deleted > 0)
    }

    fn row_to_report_row(row: &rusqlite::Row) -> rusqlite::Result<ReportRow> {
        Ok(ReportRow {
            id: row.get(0)?,
            doc_type: row.get(1)?,
            name: row.get(2)?,
            rate: row.get(3)?,
            desig: row.get(4)?,
            ssn: row.get(5)?,
            group: row.get(6)?,
            uic: row.get(7)?,
            station: row.get(8)?,
            promotion_status: row.get(9)?,
            date_reported: row.get(10)?,
            periodic: row.get(11)?,
            det_indiv: row.get(12)?,
            special: row.get(13)?,
            period_start: row.get(14)?,
            period_end: row.get(15)?,
            not_observed: row.get(16)?,
            regular: row.get(17)?,
            concurrent: row.get(18)?,
            billet_subcategory: row.get(19)?,
            senior_name: row.get(20)?,
            senior_grade: row.get(21)?,
            senior_desig: row.get(22)?,
            senior_title: row.get(23)?,
            senior_uic: row.get(24)?,
            senior_ssn: row.get(25)?,
            senior_address: row.get(26)?,
            job: row.get(27)?,
            duties_abbreviation: row.get(28)?,
            duties_description: row.get(29)?,
            date_counseled: row.get(30)?,
            counselor: row.get(31)?,
            career_rec_1: row.get(32)?,
            career_rec_2: row.get(33)?,
            comments: row.get(34)?,
            indiv_promo_rec: row.get(35)?,
            extra: row.get(36)?,
        })
    }
}

/// Runs an insert or update whose named parameters are the report columns
/// plus `:id` (NULL lets SQLite assign one).
fn write_report(conn: &Connection, sql: &str, report: &Report, id: Option<i64>) -> Result<usize> {
    let extra = extra_json(&report.kind)?;
    let changed = conn.execute(
        sql,
        named_params! {
            ":id": id,
            ":doc_type": report.report_type().tag(),
            ":name": report.name,
            ":rate": report.rate,
            ":desig": report.desig,
            ":ssn": report.ssn,
            ":summary_group": report.group.map(|g| g.code()),
            ":uic": report.uic,
            ":station": report.station,
            ":promotion_status": report.promotion_status.map(|s| s.code()),
            ":date_reported": report.date_reported,
            ":periodic": report.periodic,
            ":det_indiv": report.det_indiv,
            ":special": report.special,
            ":period_start": report.period_start,
            ":period_end": report.period_end,
            ":not_observed": report.not_observed,
            ":regular": report.regular,
            ":concurrent": report.concurrent,
            ":billet_subcategory": report.billet_subcategory.map(|b| b.code()),
            ":senior_name": report.senior_name,
            ":senior_grade": report.senior_grade,
            ":senior_desig": report.senior_desig,
            ":senior_title": report.senior_title,
            ":senior_uic": report.senior_uic,
            ":senior_ssn": report.senior_ssn,
            ":senior_address": report.senior_address,
            ":job": report.job,
            ":duties_abbreviation": report.duties_abbreviation,
            ":duties_description": report.duties_description,
            ":date_counseled": report.date_counseled,
            ":counselor": report.counselor,
            ":career_rec_1": report.career_rec_1,
            ":career_rec_2": report.career_rec_2,
            ":comments": report.comments,
            ":indiv_promo_rec": report.indiv_promo_rec.map(u8::from),
            ":extra": extra,
        },
    )?;
    Ok(changed)
}

fn extra_json(kind: &ReportKind) -> Result<String> {
    let json = match kind {
        ReportKind::Fitrep(extra) => serde_json::to_string(extra),
        ReportKind::Eval(extra) => serde_json::to_string(extra),
        ReportKind::ChiefEval(extra) => serde_json::to_string(extra),
    };
    json.context("Failed to serialize report details")
}

/// A `reports` row as SQLite hands it back, before the codes are checked.
struct ReportRow {
    id: i64,
    doc_type: String,
    name: String,
    rate: String,
    desig: String,
    ssn: String,
    group: Option<String>,
    uic: String,
    station: String,
    promotion_status: Option<String>,
    date_reported: Option<NaiveDate>,
    periodic: bool,
    det_indiv: bool,
    special: bool,
    period_start: Option<NaiveDate>,
    period_end: Option<NaiveDate>,
    not_observed: bool,
    regular: bool,
    concurrent: bool,
    billet_subcategory: Option<String>,
    senior_name: String,
    senior_grade: String,
    senior_desig: String,
    senior_title: String,
    senior_uic: String,
    senior_ssn: String,
    senior_address: String,
    job: String,
    duties_abbreviation: String,
    duties_description: String,
    date_counseled: Option<NaiveDate>,
    counselor: String,
    career_rec_1: String,
    career_rec_2: String,
    comments: String,
    indiv_promo_rec: Option<u8>,
    extra: String,
}

impl ReportRow {
    fn into_report(self) -> Result<Report> {
        let kind = match ReportType::from_tag(&self.doc_type)? {
            ReportType::Fitrep => {
                ReportKind::Fitrep(serde_json::from_str::<FitrepExtra>(&self.extra)?)
            }
            ReportType::Eval => ReportKind::Eval(serde_json::from_str::<EvalExtra>(&self.extra)?),
            ReportType::ChiefEval => {
                ReportKind::ChiefEval(serde_json::from_str::<ChiefEvalExtra>(&self.extra)?)
            }
        };
        let indiv_promo_rec = self
            .indiv_promo_rec
            .map(PromotionRecommendation::try_from)
            .transpose()
            .map_err(|e| anyhow!(e))?;

        Ok(Report {
            id: Some(self.id),
            name: self.name,
            rate: self.rate,
            desig: self.desig,
            ssn: self.ssn,
            group: self.group.as_deref().map(str::parse).transpose()?,
            uic: self.uic,
            station: self.station,
            promotion_status: self.promotion_status.as_deref().map(str::parse).transpose()?,
            date_reported: self.date_reported,
            periodic: self.periodic,
            det_indiv: self.det_indiv,
            special: self.special,
            period_start: self.period_start,
            period_end: self.period_end,
            not_observed: self.not_observed,
            regular: self.regular,
            concurrent: self.concurrent,
            billet_subcategory: self.billet_subcategory.as_deref().map(str::parse).transpose()?,
            senior_name: self.senior_name,
            senior_grade: self.senior_grade,
            senior_desig: self.senior_desig,
            senior_title: self.senior_title,
            senior_uic: self.senior_uic,
            senior_ssn: self.senior_ssn,
            senior_address: self.senior_address,
            job: self.job,
            duties_abbreviation: self.duties_abbreviation,
            duties_description: self.duties_description,
            date_counseled: self.date_counseled,
            counselor: self.counselor,
            career_rec_1: self.career_rec_1,
            career_rec_2: self.career_rec_2,
            comments: self.comments,
            indiv_promo_rec,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BilletSubcategory, PhysicalReadiness, PromotionStatus, SummaryGroup,
    };
    use tempfile::TempDir;

    fn temp_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("data/navfitx.db")).unwrap();
        db.init().unwrap();
        (dir, db)
    }

    fn full_fitrep() -> Report {
        let mut report = Report::new(ReportType::Fitrep);
        report.name = "DOE, JOHN A".to_string();
        report.rate = "LT".to_string();
        report.desig = "1110".to_string();
        report.ssn = "123-45-6789".to_string();
        report.group = Some(SummaryGroup::AtAdos);
        report.uic = "12345".to_string();
        report.station = "USS NEVERSAIL".to_string();
        report.promotion_status = Some(PromotionStatus::Regular);
        report.date_reported = NaiveDate::from_ymd_opt(2023, 6, 1);
        report.periodic = true;
        report.period_start = NaiveDate::from_ymd_opt(2024, 2, 1);
        report.period_end = NaiveDate::from_ymd_opt(2025, 1, 31);
        report.regular = true;
        report.billet_subcategory = Some(BilletSubcategory::IndivAug);
        report.senior_name = "SMITH, R".to_string();
        report.duties_description = "Division officer.\n\nWatch officer.".to_string();
        report.date_counseled = NaiveDate::from_ymd_opt(2024, 8, 1);
        report.comments = "Line one.\nLine two.".to_string();
        report.indiv_promo_rec = Some(PromotionRecommendation::EarlyPromote);
        report.kind = ReportKind::Fitrep(FitrepExtra {
            det_rs: false,
            ops_cdr: false,
            physical_readiness: Some(PhysicalReadiness::Pass),
            pro_expertise: Some(4),
            leadership: Some(5),
            teamwork: Some(0),
            ..FitrepExtra::default()
        });
        report
    }

    #[test]
    fn test_saved_report_loads_back_equal() {
        let (_dir, db) = temp_db();
        let mut report = full_fitrep();
        let id = db.insert_report(&report).unwrap();
        report.id = Some(id);

        let loaded = db.get_report(id).unwrap().unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_eval_extra_round_trips() {
        let (_dir, db) = temp_db();
        let mut report = Report::new(ReportType::Eval);
        report.kind = ReportKind::Eval(EvalExtra {
            prom_frock: true,
            achievements: "Qualified EOOW.".to_string(),
            retain: Some(false),
            initiative: Some(3),
            ..EvalExtra::default()
        });
        let id = db.insert_report(&report).unwrap();
        report.id = Some(id);
        assert_eq!(db.get_report(id).unwrap(), Some(report));
    }

    #[test]
    fn test_missing_report_is_none() {
        let (_dir, db) = temp_db();
        assert!(db.get_report(42).unwrap().is_none());
        assert!(!db.delete_report(42).unwrap());
    }

    #[test]
    fn test_save_updates_in_place() {
        let (_dir, db) = temp_db();
        let mut report = full_fitrep();
        let id = db.save_report(&report).unwrap();
        report.id = Some(id);
        report.station = "NAS NOWHERE".to_string();

        assert_eq!(db.save_report(&report).unwrap(), id);
        assert_eq!(db.list_reports(None).unwrap().len(), 1);
        assert_eq!(db.get_report(id).unwrap().unwrap().station, "NAS NOWHERE");
    }

    #[test]
    fn test_update_unknown_id_fails() {
        let (_dir, db) = temp_db();
        let mut report = full_fitrep();
        report.id = Some(7);
        assert!(db.update_report(&report).is_err());
    }

    #[test]
    fn test_list_filters_by_type_and_delete() {
        let (_dir, db) = temp_db();
        let fitrep = db.insert_report(&full_fitrep()).unwrap();
        db.insert_report(&Report::new(ReportType::Eval)).unwrap();
        db.insert_report(&Report::new(ReportType::ChiefEval)).unwrap();

        assert_eq!(db.list_reports(None).unwrap().len(), 3);
        let evals = db.list_reports(Some(ReportType::Eval)).unwrap();
        assert_eq!(evals.len(), 1);
        assert_eq!(evals[0].report_type(), ReportType::Eval);

        assert!(db.delete_report(fitrep).unwrap());
        assert!(db.list_reports(Some(ReportType::Fitrep)).unwrap().is_empty());
    }

    #[test]
    fn test_uninitialized_database_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("fresh.db")).unwrap();
        let err = db.ensure_initialized().unwrap_err();
        assert!(err.to_string().contains("navfitx init"));
    }

    #[test]
    fn test_checking_missing_database_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/navfitx.db");
        let db = Database::open(&path).unwrap();

        assert!(!db.exists());
        assert!(db.ensure_initialized().is_err());
        assert!(!path.exists());
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn test_insert_and_update_store_same_columns() {
        let (_dir, db) = temp_db();
        let mut report = full_fitrep();
        let id = db.insert_report(&report).unwrap();
        report.id = Some(id);
        report.career_rec_1 = "XO AFLOAT".to_string();
        report.indiv_promo_rec = None;
        report.group = None;
        db.update_report(&report).unwrap();
        assert_eq!(db.get_report(id).unwrap(), Some(report));
    }
}
