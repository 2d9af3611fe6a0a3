//! Single-connection database session used by the PostgreSQL keywords.

use std::sync::OnceLock;

use keystone_common::error::sanitize_error_message;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use keystone_common::{keyword, KeywordArg, KeywordError, KeywordLibrary, LibraryDoc, Result};
use regex::Regex;
use sqlx::postgres::{PgArguments, PgConnection, PgQueryResult, PgRow};
use sqlx::{Connection as _, Either, Executor as _};
use tracing::{debug, info, instrument, warn};

use crate::identifier::{quote_identifier, split_table_name, validate_identifier_part};
use crate::params::ConnectParams;
use crate::transaction::{SessionState, TransactionEnd};
use crate::types::{row_to_values, ColumnInfo, QueryResult, Row, SqlValue};

const COLUMNS_SQL: &str = "SELECT column_name::text, data_type::text, udt_name::text, \
     is_nullable::text, ordinal_position::int4, column_default::text \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 \
     ORDER BY ordinal_position";

const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1 AND table_name = $2)";

/// Whether a statement is expected to yield a result set, even an empty one.
///
/// Reads are recognized by their leading keyword, writes by a `RETURNING`
/// clause. String literals, quoted identifiers and comments are ignored.
pub fn returns_rows(sql: &str) -> bool {
    static RETURNING_RE: OnceLock<Regex> = OnceLock::new();
    let returning_re =
        RETURNING_RE.get_or_init(|| Regex::new(r"(?i)\breturning\b").expect("valid regex"));

    let code = strip_literals_and_comments(sql);
    matches!(
        leading_keyword(&code).as_str(),
        "SELECT" | "WITH" | "VALUES" | "SHOW" | "TABLE" | "EXPLAIN"
    ) || returning_re.is_match(&code)
}

fn leading_keyword(code: &str) -> String {
    code.trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Blank out string literals, quoted identifiers, dollar-quoted bodies and
/// comments, leaving only the statement's own keywords.
fn strip_literals_and_comments(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        match chars[i] {
            '\'' => {
                // E'...' strings allow backslash escapes
                let escaped = i > 0
                    && matches!(chars[i - 1], 'e' | 'E')
                    && (i < 2 || !is_identifier_char(chars[i - 2]));
                i = skip_quoted(&chars, i + 1, '\'', escaped);
                out.push(' ');
            }
            '"' => {
                i = skip_quoted(&chars, i + 1, '"', false);
                out.push(' ');
            }
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                out.push(' ');
            }
            '/' if next == Some('*') => {
                let mut depth = 0;
                while i < chars.len() {
                    if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                        depth += 1;
                        i += 2;
                    } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        depth -= 1;
                        i += 2;
                        if depth == 0 {
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
                out.push(' ');
            }
            '$' => match dollar_tag_end(&chars, i) {
                Some(tag_end) => {
                    let tag = &chars[i..=tag_end];
                    let mut k = tag_end + 1;
                    i = loop {
                        if k + tag.len() > chars.len() {
                            break chars.len();
                        }
                        if &chars[k..k + tag.len()] == tag {
                            break k + tag.len();
                        }
                        k += 1;
                    };
                    out.push(' ');
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Index just past the closing quote; doubled quotes are escapes.
fn skip_quoted(chars: &[char], start: usize, quote: char, backslash_escapes: bool) -> usize {
    let mut i = start;
    while i < chars.len() {
        if backslash_escapes && chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Closing `$` of a dollar-quote tag (`$$` or `$tag$`) starting at `start`.
/// Positional parameters (`$1`) are not tags.
fn dollar_tag_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    while chars.get(j).is_some_and(|c| is_identifier_char(*c)) {
        j += 1;
    }
    (chars.get(j) == Some(&'$')).then_some(j)
}

/// Drain a result stream into its rows and the summed affected-row count.
async fn collect_results(
    mut stream: BoxStream<'_, std::result::Result<Either<PgQueryResult, PgRow>, sqlx::Error>>,
) -> std::result::Result<(Vec<PgRow>, u64), sqlx::Error> {
    let mut rows = Vec::new();
    let mut affected = 0;
    while let Some(step) = stream.try_next().await? {
        match step {
            Either::Left(done) => affected += done.rows_affected(),
            Either::Right(row) => rows.push(row),
        }
    }
    Ok((rows, affected))
}

/// Driver errors from a statement. A missing relation is the statement's fault here.
fn statement_failure(err: sqlx::Error) -> KeywordError {
    let err = match KeywordError::from(err) {
        KeywordError::TableNotFound(msg) => KeywordError::QueryError(msg),
        other => other,
    };
    warn!(error = %err, "Statement failed");
    err
}

/// A database session holding at most one connection.
///
/// All statements run on that connection, so a transaction begun with
/// [`begin_transaction`](Self::begin_transaction) covers every statement up
/// to the matching commit or rollback.
///
/// # Example
///
/// ```ignore
/// let mut session = DatabaseSession::new();
/// session.connect(&ConnectParams::from_env()).await?;
/// session.begin_transaction().await?;
/// session
///     .execute_query("INSERT INTO users (name) VALUES ($1)", &["alice".into()])
///     .await?;
/// session.rollback_transaction().await?;
/// session.close().await?;
/// ```
#[derive(Default)]
pub struct DatabaseSession {
    conn: Option<PgConnection>,
    state: SessionState,
    target: Option<String>,
}

impl std::fmt::Debug for DatabaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSession")
            .field("state", &self.state)
            .field("target", &self.target)
            .finish()
    }
}

impl DatabaseSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Connection target without credentials, while connected.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    fn connection(&mut self) -> Result<&mut PgConnection> {
        self.state.check_usable()?;
        self.conn
            .as_mut()
            .ok_or_else(|| KeywordError::ConnectionFailed("not connected".to_string()))
    }

    /// Open the session's connection.
    #[instrument(skip(self, params), fields(target = %params.target()))]
    pub async fn connect(&mut self, params: &ConnectParams) -> Result<()> {
        let target = params.target();
        self.state
            .check_connect(self.target.as_deref().unwrap_or(&target))?;

        let options = params.connect_options()?;
        let conn = PgConnection::connect_with(&options).await.map_err(|e| {
            let err = KeywordError::ConnectionFailed(sanitize_error_message(&e.to_string()));
            warn!(error = %err, "Connection failed");
            err
        })?;

        self.conn = Some(conn);
        self.state = SessionState::Connected;
        self.target = Some(target);
        info!("Connected");
        Ok(())
    }

    /// Run a statement with positional parameters (`$1`, `$2`, ...).
    ///
    /// The statement runs once. Anything that produces rows, or is a read or
    /// a `RETURNING` write that matched nothing, yields `Rows`; everything
    /// else yields the affected-row count. Parameterless writes go through
    /// the simple query protocol, so a script of several `;`-separated
    /// statements runs as one call. Statements are not cached, so the same
    /// SQL may be run again with differently typed arguments.
    #[instrument(skip(self, params), fields(param_count = params.len()))]
    pub async fn execute_query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let expects_rows = returns_rows(sql);
        let conn = self.connection()?;

        let outcome = if params.is_empty() && !expects_rows {
            collect_results(sqlx::raw_sql(sql).fetch_many(&mut *conn)).await
        } else {
            let mut arguments = PgArguments::default();
            for param in params {
                param.bind_to_arguments(&mut arguments)?;
            }
            let query = sqlx::query_with(sql, arguments).persistent(false);
            collect_results((&mut *conn).fetch_many(query)).await
        };
        let (rows, affected) = outcome.map_err(statement_failure)?;

        if rows.is_empty() && !expects_rows {
            debug!(affected, "Statement completed");
            return Ok(QueryResult::Affected(affected));
        }

        let rows = rows.iter().map(row_to_values).collect::<Result<Vec<Row>>>()?;
        debug!(rows = rows.len(), "Query completed");
        Ok(QueryResult::Rows(rows))
    }

    pub async fn begin_transaction(&mut self) -> Result<()> {
        let next = self.state.begin()?;
        let conn = self.connection()?;

        sqlx::raw_sql("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(statement_failure)?;

        self.state = next;
        debug!("Transaction started");
        Ok(())
    }

    pub async fn commit_transaction(&mut self) -> Result<()> {
        self.end_transaction(TransactionEnd::Commit).await
    }

    pub async fn rollback_transaction(&mut self) -> Result<()> {
        self.end_transaction(TransactionEnd::Rollback).await
    }

    async fn end_transaction(&mut self, end: TransactionEnd) -> Result<()> {
        let next = self.state.finish()?;
        let conn = self.connection()?;

        let result = sqlx::raw_sql(end.to_sql()).execute(&mut *conn).await;

        // The server leaves the transaction block even when COMMIT fails
        self.state = next;
        result.map_err(statement_failure)?;

        debug!(end = end.to_sql(), "Transaction finished");
        Ok(())
    }

    /// Whether `table` (or `schema.table`) exists.
    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let (schema, name) = split_table_name(table)?;
        let conn = self.connection()?;

        sqlx::query_scalar::<_, bool>(TABLE_EXISTS_SQL)
            .bind(schema)
            .bind(name)
            .fetch_one(&mut *conn)
            .await
            .map_err(statement_failure)
    }

    /// Fail with `TableNotFound` unless `table` exists.
    pub async fn verify_table_exists(&mut self, table: &str) -> Result<()> {
        if self.table_exists(table).await? {
            Ok(())
        } else {
            Err(KeywordError::TableNotFound(table.to_string()))
        }
    }

    /// Columns of `table` in ordinal order.
    pub async fn get_table_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        let (schema, name) = split_table_name(table)?;
        let conn = self.connection()?;

        let rows: Vec<(String, String, String, String, i32, Option<String>)> =
            sqlx::query_as(COLUMNS_SQL)
                .bind(schema)
                .bind(name)
                .fetch_all(&mut *conn)
                .await
                .map_err(statement_failure)?;

        if rows.is_empty() {
            return Err(KeywordError::TableNotFound(table.to_string()));
        }

        Ok(rows
            .into_iter()
            .map(
                |(name, data_type, udt_name, is_nullable, ordinal_position, default_value)| {
                    ColumnInfo {
                        name,
                        data_type,
                        udt_name,
                        is_nullable: is_nullable.eq_ignore_ascii_case("YES"),
                        ordinal_position,
                        default_value,
                    }
                },
            )
            .collect())
    }

    /// Remove every row from `table`.
    ///
    /// Inside an open transaction the truncation is part of it.
    pub async fn truncate_table(&mut self, table: &str) -> Result<()> {
        let (schema, name) = split_table_name(table)?;
        self.verify_table_exists(table).await?;

        let sql = format!(
            "TRUNCATE TABLE {}.{}",
            quote_identifier(schema),
            quote_identifier(name)
        );
        let conn = self.connection()?;
        sqlx::query(&sql)
            .execute(&mut *conn)
            .await
            .map_err(statement_failure)?;

        info!(table, "Table truncated");
        Ok(())
    }

    /// Insert one row built from `data`, returning the number of rows inserted.
    ///
    /// Every value is cast to its column's type on the server, so text
    /// arguments from a test script land in typed columns.
    pub async fn insert_test_data(&mut self, table: &str, data: &Row) -> Result<u64> {
        let (schema, name) = split_table_name(table)?;
        for column in data.column_names() {
            validate_identifier_part(column)?;
        }
        let columns = self.get_table_columns(table).await?;

        let target = format!("{}.{}", quote_identifier(schema), quote_identifier(name));
        let mut arguments = PgArguments::default();

        let sql = if data.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", target)
        } else {
            let mut names = Vec::with_capacity(data.len());
            let mut placeholders = Vec::with_capacity(data.len());

            for (idx, (column, value)) in data.iter().enumerate() {
                let info = columns.iter().find(|c| c.name == column).ok_or_else(|| {
                    KeywordError::QueryError(format!(
                        "Column '{}' does not exist in table '{}'",
                        column, table
                    ))
                })?;

                names.push(quote_identifier(column));
                placeholders.push(format!("${}::{}", idx + 1, quote_identifier(&info.udt_name)));
                value.bind_for_cast(&mut arguments)?;
            }

            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                target,
                names.join(", "),
                placeholders.join(", ")
            )
        };

        let conn = self.connection()?;
        let inserted = sqlx::query_with(&sql, arguments)
            .persistent(false)
            .execute(&mut *conn)
            .await
            .map_err(statement_failure)?
            .rows_affected();

        debug!(table, inserted, "Test data inserted");
        Ok(inserted)
    }

    /// Release the connection, rolling back an open transaction first.
    ///
    /// Closing a session that is not connected does nothing.
    pub async fn close(&mut self) -> Result<()> {
        let in_transaction = self.state.in_transaction();
        self.state = SessionState::Disconnected;
        let target = self.target.take();

        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        if in_transaction {
            if let Err(e) = sqlx::raw_sql("ROLLBACK").execute(&mut conn).await {
                warn!(error = %e, "Rollback before close failed");
            }
        }

        conn.close().await.map_err(|e| {
            KeywordError::ConnectionFailed(sanitize_error_message(&e.to_string()))
        })?;

        info!(target = target.as_deref().unwrap_or(""), "Disconnected");
        Ok(())
    }
}

impl KeywordLibrary for DatabaseSession {
    const LIBRARY_NAME: &'static str = "PostgreSQLLibrary";

    fn library_doc() -> LibraryDoc {
        LibraryDoc::new(
            Self::LIBRARY_NAME,
            "PostgreSQL specific database operations.",
        )
        .keyword(
            keyword!(DatabaseSession::connect, "Connect to PostgreSQL database")
                .arg(KeywordArg::required("params")),
        )
        .keyword(
            keyword!(
                DatabaseSession::execute_query,
                "Execute PostgreSQL query with optional parameters"
            )
            .arg(KeywordArg::required("sql"))
            .arg(KeywordArg::optional("params", "[]")),
        )
        .keyword(keyword!(DatabaseSession::begin_transaction, "Begin database transaction"))
        .keyword(keyword!(DatabaseSession::commit_transaction, "Commit current transaction"))
        .keyword(keyword!(DatabaseSession::rollback_transaction, "Rollback current transaction"))
        .keyword(
            keyword!(DatabaseSession::get_table_columns, "Get column information for specified table")
                .arg(KeywordArg::required("table")),
        )
        .keyword(
            keyword!(DatabaseSession::table_exists, "Check whether a table exists")
                .arg(KeywordArg::required("table")),
        )
        .keyword(
            keyword!(DatabaseSession::verify_table_exists, "Verify that table exists in database")
                .arg(KeywordArg::required("table")),
        )
        .keyword(
            keyword!(DatabaseSession::truncate_table, "Truncate specified table")
                .arg(KeywordArg::required("table")),
        )
        .keyword(
            keyword!(DatabaseSession::insert_test_data, "Insert test data into specified table")
                .arg(KeywordArg::required("table"))
                .arg(KeywordArg::required("data")),
        )
        .keyword(keyword!(DatabaseSession::close, "Close the database connection"))
    }
}
