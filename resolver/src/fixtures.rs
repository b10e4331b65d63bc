use crate::{ContentType, ParamRow};
use lazy_static::lazy_static;

/// hex(sha256("secret"))
pub const SECRET_HASH: &str = "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b";
pub const SECRET_PASSWORD: &str = "secret";

pub const TREE_MTIME_1: &str = "2024-03-01 10:00:00";
pub const TREE_MTIME_2: &str = "2024-03-01 10:05:00";

pub fn row(
    id: i64,
    parent_id: Option<i64>,
    name: &str,
    path: &str,
    content_type: ContentType,
    value: Option<&str>,
) -> ParamRow {
    ParamRow {
        id,
        name: name.to_string(),
        path: path.to_string(),
        mtime: TREE_MTIME_1.to_string(),
        version: 1,
        content_type,
        value: value.map(str::to_string),
        parent_id,
    }
}

lazy_static! {
    /// A tree without any context dependent node.
    pub static ref COMMON_TREE_ROWS: Vec<ParamRow> = vec![
        row(1, None, "", "/", ContentType::Null, None),
        row(2, Some(1), "app", "/app", ContentType::Null, None),
        row(3, Some(2), "empty", "/app/empty", ContentType::Text, Some("")),
        row(4, Some(2), "port", "/app/port", ContentType::Text, Some("8080")),
        row(5, Some(2), "db", "/app/db", ContentType::Null, None),
        row(6, Some(5), "host", "/app/db/host", ContentType::Text, Some("db1")),
    ];

    /// A plain value and a symlink to it.
    pub static ref SCENARIO_A_ROWS: Vec<ParamRow> = vec![
        row(1, None, "", "/", ContentType::Null, None),
        row(2, Some(1), "a", "/a", ContentType::Text, Some("1")),
        row(3, Some(1), "b", "/b", ContentType::Symlink, Some("/a")),
    ];

    /// A case node at /x/y/z, with common siblings on every level.
    pub static ref DEEP_TREE_ROWS: Vec<ParamRow> = vec![
        row(1, None, "", "/", ContentType::Null, None),
        row(2, Some(1), "x", "/x", ContentType::Null, None),
        row(3, Some(2), "y", "/x/y", ContentType::Null, None),
        row(4, Some(3), "z", "/x/y/z", ContentType::Case, Some("[]")),
        row(5, Some(3), "w", "/x/y/w", ContentType::Text, Some("w")),
        row(6, Some(2), "v", "/x/v", ContentType::Text, Some("v")),
        row(7, Some(1), "u", "/u", ContentType::Text, Some("u")),
    ];

    /// A tree carrying all three context indexes below /onlineconf, plus
    /// regular parameters and symlinks into both.
    pub static ref CONTEXT_TREE_ROWS: Vec<ParamRow> = vec![
        row(1, None, "", "/", ContentType::Null, None),
        row(2, Some(1), "onlineconf", "/onlineconf", ContentType::Null, None),
        row(3, Some(2), "datacenter", "/onlineconf/datacenter", ContentType::Null, None),
        row(
            4,
            Some(3),
            "dc1",
            "/onlineconf/datacenter/dc1",
            ContentType::Text,
            Some("10.0.0.0/8, 192.168.1.0/24"),
        ),
        row(
            5,
            Some(3),
            "dc2",
            "/onlineconf/datacenter/dc2",
            ContentType::Text,
            Some("172.16.0.0/12"),
        ),
        row(6, Some(2), "group", "/onlineconf/group", ContentType::Null, None),
        row(
            7,
            Some(6),
            "web",
            "/onlineconf/group/web",
            ContentType::Text,
            Some("web*.example.com"),
        ),
        row(
            8,
            Some(6),
            "db",
            "/onlineconf/group/db",
            ContentType::Text,
            Some("db?.example.com,db-*.example.com"),
        ),
        row(9, Some(2), "service", "/onlineconf/service", ContentType::Null, None),
        row(
            10,
            Some(9),
            "billing",
            "/onlineconf/service/billing",
            ContentType::Text,
            Some(SECRET_HASH),
        ),
        row(
            11,
            Some(9),
            "alias",
            "/onlineconf/service/alias",
            ContentType::Symlink,
            Some("/onlineconf/service/billing"),
        ),
        row(12, Some(9), "disabled", "/onlineconf/service/disabled", ContentType::Null, None),
        row(13, Some(1), "app", "/app", ContentType::Null, None),
        row(14, Some(13), "port", "/app/port", ContentType::Text, Some("8080")),
        row(15, Some(13), "db", "/app/db", ContentType::Symlink, Some("/app/port")),
        row(16, Some(1), "link", "/link", ContentType::Symlink, Some("/app")),
        row(
            17,
            Some(13),
            "billing",
            "/app/billing",
            ContentType::Symlink,
            Some("/onlineconf/service/billing"),
        ),
    ];
}
