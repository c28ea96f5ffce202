use redb::TableDefinition;

/// Household credential: CREDENTIAL_KEY -> Credential (msgpack)
pub const CREDENTIAL: TableDefinition<&str, &[u8]> = TableDefinition::new("credential");

/// Sessions: token -> Session (msgpack)
pub const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Expiration index: "{expires_at_ms:020}.{sub_ms_nanos:06}:{token}" -> token (sorted by expiry time)
pub const SESSION_EXPIRY: TableDefinition<&str, &str> = TableDefinition::new("session_expiry");

/// Audit log: "{created_at_ms:020}.{sub_ms_nanos:06}:{id}" -> AuditEntry (msgpack), oldest first
pub const AUDIT_LOG: TableDefinition<&str, &[u8]> = TableDefinition::new("audit_log");

/// Secondary index: "{entity_type}/{entity_id}/{log_key}" -> log_key
pub const AUDIT_BY_ENTITY: TableDefinition<&str, &str> = TableDefinition::new("audit_by_entity");

/// Fixed key of the single household credential row
pub const CREDENTIAL_KEY: &str = "household";
