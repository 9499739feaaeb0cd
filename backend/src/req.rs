//! Maps a request path and query string to a typed [`Request`].
//!
//! Routes are declared in [`ROUTES`]; adding an endpoint means adding a row
//! there and a variant to [`Request`]. Nothing here depends on actix.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    GetVersion,
    GetEarliestTimestamp,
    FetchCurrent,
    FetchArchive {
        since_ts: i64,
        max_ts: Option<i64>,
        limit: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("A command must be specified.")]
    NoCommand,

    #[error("Unknown command: {0}.")]
    UnknownCommand(String),

    #[error("{command} requires {param} argument")]
    MissingArgument {
        command: &'static str,
        param: &'static str,
    },

    #[error("The {param} argument must be an integer, found: '{value}'.")]
    NotAnInteger { param: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Required,
    Optional,
}

struct Param {
    name: &'static str,
    presence: Presence,
}

struct Route {
    command: &'static str,
    params: &'static [Param],
    build: fn(&Args) -> Result<Request, RequestError>,
}

/// Integer arguments of one request, already checked against its route.
struct Args {
    command: &'static str,
    values: HashMap<&'static str, i64>,
}

impl Args {
    fn optional(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    fn required(&self, name: &'static str) -> Result<i64, RequestError> {
        self.optional(name).ok_or(RequestError::MissingArgument {
            command: self.command,
            param: name,
        })
    }
}

const ROUTES: &[Route] = &[
    Route {
        command: "get-version",
        params: &[],
        build: |_| Ok(Request::GetVersion),
    },
    Route {
        command: "get-earliest-timestamp",
        params: &[],
        build: |_| Ok(Request::GetEarliestTimestamp),
    },
    Route {
        command: "v1/current_conditions",
        params: &[],
        build: |_| Ok(Request::FetchCurrent),
    },
    Route {
        command: "fetch-archive-records",
        params: &[
            Param {
                name: "since_ts",
                presence: Presence::Required,
            },
            Param {
                name: "max_ts",
                presence: Presence::Optional,
            },
            Param {
                name: "limit",
                presence: Presence::Optional,
            },
        ],
        build: |args| {
            Ok(Request::FetchArchive {
                since_ts: args.required("since_ts")?,
                max_ts: args.optional("max_ts"),
                limit: args.optional("limit"),
            })
        },
    },
];

/// Splits `a=1&b=2` (or the older `a=1,b=2`) into pairs. Keyless pairs are dropped.
fn split_query(query: &str) -> HashMap<&str, &str> {
    query
        .split(|c| c == '&' || c == ',')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

pub fn parse(path: &str, query: &str) -> Result<Request, RequestError> {
    let command = path.trim_start_matches('/');
    if command.is_empty() {
        return Err(RequestError::NoCommand);
    }

    let route = ROUTES
        .iter()
        .find(|route| route.command == command)
        .ok_or_else(|| RequestError::UnknownCommand(path.to_string()))?;

    let raw = split_query(query);
    let mut values = HashMap::new();
    for param in route.params {
        match raw.get(param.name) {
            Some(value) => {
                let parsed = value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| RequestError::NotAnInteger {
                        param: param.name,
                        value: value.to_string(),
                    })?;
                values.insert(param.name, parsed);
            }
            None if param.presence == Presence::Required => {
                return Err(RequestError::MissingArgument {
                    command: route.command,
                    param: param.name,
                });
            }
            None => {}
        }
    }

    (route.build)(&Args {
        command: route.command,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("/get-version", ""), Ok(Request::GetVersion));
        assert_eq!(
            parse("/get-earliest-timestamp", ""),
            Ok(Request::GetEarliestTimestamp)
        );
        assert_eq!(parse("/v1/current_conditions", ""), Ok(Request::FetchCurrent));
        // arguments to argument-less commands are ignored
        assert_eq!(parse("/get-version", "since_ts=abc"), Ok(Request::GetVersion));
    }

    #[test]
    fn test_fetch_archive_arguments() {
        assert_eq!(
            parse("/fetch-archive-records", "since_ts=1600657320"),
            Ok(Request::FetchArchive {
                since_ts: 1600657320,
                max_ts: None,
                limit: None
            })
        );
        assert_eq!(
            parse("/fetch-archive-records", "since_ts=10&max_ts=20&limit=5"),
            Ok(Request::FetchArchive {
                since_ts: 10,
                max_ts: Some(20),
                limit: Some(5)
            })
        );
        assert_eq!(
            parse("/fetch-archive-records", "since_ts=10,limit=5,=7,junk"),
            Ok(Request::FetchArchive {
                since_ts: 10,
                max_ts: None,
                limit: Some(5)
            })
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("/", ""), Err(RequestError::NoCommand));
        assert_eq!(
            parse("/dance", "").unwrap_err().to_string(),
            "Unknown command: /dance."
        );
        assert_eq!(
            parse("/fetch-archive-records", "max_ts=5")
                .unwrap_err()
                .to_string(),
            "fetch-archive-records requires since_ts argument"
        );
        assert_eq!(
            parse("/fetch-archive-records", "since_ts=yesterday")
                .unwrap_err()
                .to_string(),
            "The since_ts argument must be an integer, found: 'yesterday'."
        );
        assert_eq!(
            parse("/fetch-archive-records", "since_ts=1&limit=1.5"),
            Err(RequestError::NotAnInteger {
                param: "limit",
                value: "1.5".to_string()
            })
        );
    }
}
