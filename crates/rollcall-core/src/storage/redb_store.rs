//! redb-backed roster store.
//!
//! Tables are keyed `(tenant, id)` with postcard-encoded values, so a range
//! scan over one tenant never touches another tenant's rows. The store
//! supports both a full save/load cycle (CLI) and incremental single-record
//! writes (the server's per-request persistence path).

use crate::district::District;
use crate::iep::IepDocument;
use crate::license::SeatPool;
use crate::primitives::{DraftId, StudentId, TenantId, Zip};
use crate::roster::Roster;
use crate::student::StudentRecord;
use crate::wizard::EnrollmentWizard;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use thiserror::Error;

// =============================================================================
// TABLES
// =============================================================================

const DISTRICTS: TableDefinition<u64, &[u8]> = TableDefinition::new("districts");
const ZIP_INDEX: TableDefinition<&str, u64> = TableDefinition::new("zip_index");
const POOLS: TableDefinition<u64, &[u8]> = TableDefinition::new("seat_pools");
const STUDENTS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("students");
const DRAFTS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("drafts");
const IEPS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("ieps");

// =============================================================================
// ERRORS
// =============================================================================

/// Failures from the disk-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

// =============================================================================
// STORE
// =============================================================================

/// Disk-backed roster persistence.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Create a new database file, initializing every table.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let store = Self { db };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Open an existing database file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::open(path)?;
        let store = Self { db };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            txn.open_table(DISTRICTS)?;
            txn.open_table(ZIP_INDEX)?;
            txn.open_table(POOLS)?;
            txn.open_table(STUDENTS)?;
            txn.open_table(DRAFTS)?;
            txn.open_table(IEPS)?;
        }
        txn.commit()?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Full save / load
    // -------------------------------------------------------------------------

    /// Persist the whole roster in one transaction, replacing prior
    /// contents.
    pub fn save(&self, roster: &Roster) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        // Drop and recreate the tables rather than deleting row-wise.
        txn.delete_table(DISTRICTS)?;
        txn.delete_table(ZIP_INDEX)?;
        txn.delete_table(POOLS)?;
        txn.delete_table(STUDENTS)?;
        txn.delete_table(DRAFTS)?;
        txn.delete_table(IEPS)?;
        {
            let mut districts = txn.open_table(DISTRICTS)?;
            let mut zips = txn.open_table(ZIP_INDEX)?;
            let mut pools = txn.open_table(POOLS)?;
            let mut students = txn.open_table(STUDENTS)?;
            let mut drafts = txn.open_table(DRAFTS)?;
            let mut ieps = txn.open_table(IEPS)?;

            for district in roster.directory().districts() {
                districts.insert(district.id.0, postcard::to_stdvec(district)?.as_slice())?;
            }
            for (zip, id) in roster.directory().zip_mappings() {
                zips.insert(zip.as_str(), id.0)?;
            }
            for pool in roster.seat_pools() {
                pools.insert(pool.district.0, postcard::to_stdvec(pool)?.as_slice())?;
            }
            for record in roster.all_students() {
                students.insert(
                    (record.tenant.0, record.id.0),
                    postcard::to_stdvec(record)?.as_slice(),
                )?;
            }
            for wizard in roster.wizards() {
                drafts.insert(
                    (wizard.tenant().0, wizard.id().0),
                    postcard::to_stdvec(wizard)?.as_slice(),
                )?;
            }
            for ((tenant, student), document) in roster.ieps() {
                ieps.insert(
                    (tenant.0, student.0),
                    postcard::to_stdvec(document)?.as_slice(),
                )?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Rebuild a roster from disk.
    pub fn load(&self) -> Result<Roster, StoreError> {
        let txn = self.db.begin_read()?;
        let mut roster = Roster::new();

        let districts = txn.open_table(DISTRICTS)?;
        for row in districts.iter()? {
            let (_, value) = row?;
            let district: District = postcard::from_bytes(value.value())?;
            roster.register_district(district, Vec::new());
        }

        let zips = txn.open_table(ZIP_INDEX)?;
        for row in zips.iter()? {
            let (zip, district) = row?;
            let zip = Zip::new(zip.value())
                .map_err(|e| StoreError::CorruptRow(format!("zip index: {e}")))?;
            if let Some(district) = roster
                .directory()
                .get(crate::primitives::DistrictId(district.value()))
                .cloned()
            {
                roster.register_district(district, vec![zip]);
            }
        }

        let pools = txn.open_table(POOLS)?;
        for row in pools.iter()? {
            let (_, value) = row?;
            let pool: SeatPool = postcard::from_bytes(value.value())?;
            roster.restore_pool(pool);
        }

        let students = txn.open_table(STUDENTS)?;
        for row in students.iter()? {
            let (_, value) = row?;
            let record: StudentRecord = postcard::from_bytes(value.value())?;
            roster.import_student(record);
        }

        let drafts = txn.open_table(DRAFTS)?;
        for row in drafts.iter()? {
            let (_, value) = row?;
            let wizard: EnrollmentWizard = postcard::from_bytes(value.value())?;
            roster.restore_wizard(wizard);
        }

        let ieps = txn.open_table(IEPS)?;
        for row in ieps.iter()? {
            let (key, value) = row?;
            let (tenant, _) = key.value();
            let document: IepDocument = postcard::from_bytes(value.value())?;
            roster
                .upsert_iep(TenantId(tenant), document)
                .map_err(|e| StoreError::CorruptRow(format!("iep: {e}")))?;
        }

        Ok(roster)
    }

    // -------------------------------------------------------------------------
    // Incremental writes
    // -------------------------------------------------------------------------

    /// Upsert one student record.
    pub fn put_student(&self, record: &StudentRecord) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(STUDENTS)?;
            table.insert(
                (record.tenant.0, record.id.0),
                postcard::to_stdvec(record)?.as_slice(),
            )?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Upsert one open wizard.
    pub fn put_draft(&self, wizard: &EnrollmentWizard) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DRAFTS)?;
            table.insert(
                (wizard.tenant().0, wizard.id().0),
                postcard::to_stdvec(wizard)?.as_slice(),
            )?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Remove a wizard (after finalization).
    pub fn delete_draft(&self, tenant: TenantId, draft: DraftId) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DRAFTS)?;
            table.remove((tenant.0, draft.0))?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Upsert one seat pool.
    pub fn put_pool(&self, pool: &SeatPool) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(POOLS)?;
            table.insert(pool.district.0, postcard::to_stdvec(pool)?.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Upsert one IEP document.
    pub fn put_iep(
        &self,
        tenant: TenantId,
        student: StudentId,
        document: &IepDocument,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(IEPS)?;
            table.insert(
                (tenant.0, student.0),
                postcard::to_stdvec(document)?.as_slice(),
            )?;
        }
        txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
