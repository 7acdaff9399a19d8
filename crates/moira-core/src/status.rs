//! Protocol constants, request opcodes and server status codes.
//!
//! Status codes other than [`MR_SUCCESS`] are offsets into the server's
//! error table and are compared numerically; codes not listed here are still
//! carried through [`crate::Error::Server`].

/// Well-known TCP port of the service.
pub const MOIRA_PORT: u16 = 775;

/// The single framing version understood by the codec.
pub const PROTOCOL_VERSION: u32 = 2;

/// Query version negotiated by default after connecting.
pub const DEFAULT_QUERY_VERSION: u32 = 14;

/// Maximum list nesting depth accepted by the server's own expansion.
pub const MAX_LIST_DEPTH: usize = 3072;

/// Default client identity sent with authentication requests.
pub const DEFAULT_CLIENT_IDENTITY: &str = "moira-rs";

/// Realm assumed for `user/instance` principals written without one.
pub const DEFAULT_KERBEROS_REALM: &str = "ATHENA.MIT.EDU";

/// Bytes sent by the client to start a session.
pub const SESSION_CHALLENGE: &[u8] = b"\x00\x00\x006\x00\x00\x00\x04\x01\x01\x01\x01server_id\x00parms\x00host\x00user\x00\x00\x00\x00\x01\x00\x00\x00\x00\x01\x00\x00\x00\x00\x01\x00\x00\x00\x00\x01\x00";

/// Bytes the server must answer the challenge with.
pub const SESSION_RESPONSE: &[u8] = b"\x00\x00\x001\x00\x00\x00\x03\x00\x01\x01disposition\x00server_id\x00parms\x00\x00\x00\x00\x01\x00\x00\x00\x01\x00\x00\x00\x00\x01\x00";

/// Request opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Opcode {
    /// No operation
    Noop = 0,
    /// Legacy authentication
    Auth = 1,
    /// Server shutdown
    Shutdown = 2,
    /// Named query
    Query = 3,
    /// Access check for a named query
    Access = 4,
    /// Trigger a data update
    DoUpdate = 5,
    /// Outage notice
    Motd = 6,
    /// Proxy authentication
    Proxy = 7,
    /// Query version negotiation
    SetVersion = 8,
    /// Token-based authentication
    Krb5Auth = 9,
}

impl Opcode {
    /// Returns the wire value of the opcode.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Terminal success.
pub const MR_SUCCESS: i32 = 0;

/// Base of the server's error table.
pub const ERROR_TABLE_BASE: i32 = 47_836_416;

macro_rules! status_table {
    ($($name:ident = $offset:expr, $message:expr;)*) => {
        $(
            #[doc = $message]
            pub const $name: i32 = ERROR_TABLE_BASE + $offset;
        )*

        /// Returns the description of a known status code.
        #[must_use]
        pub fn describe(code: i32) -> Option<&'static str> {
            if code == MR_SUCCESS {
                return Some("Success");
            }
            match code {
                $(c if c == $name => Some($message),)*
                _ => None,
            }
        }
    };
}

status_table! {
    MR_NO_MEM = 0, "No memory";
    MR_NOT_CONNECTED = 1, "Not connected to the server";
    MR_ALREADY_CONNECTED = 2, "Already connected to the server";
    MR_ABORTED = 3, "Connection to the server aborted";
    MR_CANT_CONNECT = 4, "Unable to connect to the server";
    MR_VERSION_HIGH = 5, "Client program version is too new";
    MR_VERSION_LOW = 6, "Client program version is too old";
    MR_MORE_DATA = 7, "More data available";
    MR_NO_HANDLE = 8, "Unknown query handle";
    MR_PERM = 9, "Insufficient permission to perform requested database access";
    MR_NO_MATCH = 10, "No records in database match query";
    MR_EXISTS = 11, "Record already exists";
    MR_ARGS = 12, "Incorrect number of arguments";
    MR_BUSY = 13, "Database is busy";
    MR_DEADLOCK = 14, "Database deadlock, try again later";
    MR_INTERNAL = 15, "Internal server error";
    MR_NOT_UNIQUE = 16, "Arguments not unique";
    MR_BAD_CHAR = 17, "Illegal character in argument";
    MR_DATE = 18, "Invalid date";
}
