//! Program definition queries.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DbError;

/// Query trait for the `program` table.
///
/// Definitions are opaque text to this layer; the caller owns the encoding.
pub trait ProgramQueries {
    /// Loads a program definition by program id.
    fn load_program(&self, program_id: &str) -> Result<Option<String>, DbError>;

    /// Stores a program definition.
    ///
    /// Storing a program id twice is an error: deployed programs are
    /// immutable.
    fn store_program(
        &self,
        program_id: &str,
        definition: &str,
        is_builtin: bool,
    ) -> Result<(), DbError>;

    /// Ids of all stored programs, sorted.
    fn list_programs(&self) -> Result<Vec<String>, DbError>;
}

impl ProgramQueries for Connection {
    fn load_program(&self, program_id: &str) -> Result<Option<String>, DbError> {
        let result = self
            .query_row(
                "SELECT definition FROM program WHERE program_id = ?1",
                params![program_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    fn store_program(
        &self,
        program_id: &str,
        definition: &str,
        is_builtin: bool,
    ) -> Result<(), DbError> {
        self.execute(
            "INSERT INTO program (program_id, is_builtin, definition) VALUES (?1, ?2, ?3)",
            params![program_id, is_builtin, definition],
        )?;
        Ok(())
    }

    fn list_programs(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.prepare("SELECT program_id FROM program ORDER BY program_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}
