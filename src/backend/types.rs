//! Column type names.
//!
//! Maps the store's numeric column type codes (MySQL protocol field types)
//! onto the type names written into schema records.

// == Column Type ==
/// Known column types, with a catch-all for anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Decimal,
    TinyInt,
    SmallInt,
    Int,
    Float,
    Double,
    Null,
    Timestamp,
    BigInt,
    MediumInt,
    Date,
    Time,
    DateTime,
    Year,
    VarChar,
    Bit,
    Json,
    Enum,
    Set,
    TinyBlob,
    MediumBlob,
    LongBlob,
    Blob,
    Char,
    Geometry,
    Unknown(u8),
}

impl ColumnType {
    /// Resolves a type code. Never fails: unmapped codes become `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 | 246 => ColumnType::Decimal,
            1 => ColumnType::TinyInt,
            2 => ColumnType::SmallInt,
            3 => ColumnType::Int,
            4 => ColumnType::Float,
            5 => ColumnType::Double,
            6 => ColumnType::Null,
            7 => ColumnType::Timestamp,
            8 => ColumnType::BigInt,
            9 => ColumnType::MediumInt,
            10 | 14 => ColumnType::Date,
            11 => ColumnType::Time,
            12 => ColumnType::DateTime,
            13 => ColumnType::Year,
            15 | 253 => ColumnType::VarChar,
            16 => ColumnType::Bit,
            245 => ColumnType::Json,
            247 => ColumnType::Enum,
            248 => ColumnType::Set,
            249 => ColumnType::TinyBlob,
            250 => ColumnType::MediumBlob,
            251 => ColumnType::LongBlob,
            252 => ColumnType::Blob,
            254 => ColumnType::Char,
            255 => ColumnType::Geometry,
            other => ColumnType::Unknown(other),
        }
    }

    /// Name stored in the schema record.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Decimal => "DECIMAL",
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Int => "INT",
            ColumnType::Float => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Null => "NULL",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::BigInt => "BIGINT",
            ColumnType::MediumInt => "MEDIUMINT",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Year => "YEAR",
            ColumnType::VarChar => "VARCHAR",
            ColumnType::Bit => "BIT",
            ColumnType::Json => "JSON",
            ColumnType::Enum => "ENUM",
            ColumnType::Set => "SET",
            ColumnType::TinyBlob => "TINYBLOB",
            ColumnType::MediumBlob => "MEDIUMBLOB",
            ColumnType::LongBlob => "LONGBLOB",
            ColumnType::Blob => "BLOB",
            ColumnType::Char => "CHAR",
            ColumnType::Geometry => "GEOMETRY",
            ColumnType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
