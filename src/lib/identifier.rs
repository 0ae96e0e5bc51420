//! Parsing of allocation names and aggregation titles.
//!
//! The cost service identifies rows by positional, slash-delimited strings.
//! Filtering and rendering only ever go through [`TitleParser`], so a backend
//! with structured identifiers only needs a new implementation here.

use std::fmt;
use std::str::FromStr;

use crate::lib::error::ParseError;

/// Allocation name of cluster capacity not attributed to any workload
pub const IDLE_KEY: &str = "__idle__";

/// Aggregation title of cost that cannot be attributed to the grouping dimension
pub const UNALLOCATED_KEY: &str = "__unallocated__";

const ALLOCATION_NAME_FIELDS: usize = 5;

/// A resource dimension that rows can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Cluster,
    Node,
    Namespace,
    Deployment,
    Pod,
    Container,
}

impl Dimension {
    pub fn as_str(&self) -> &str {
        match self {
            Dimension::Cluster => "cluster",
            Dimension::Node => "node",
            Dimension::Namespace => "namespace",
            Dimension::Deployment => "deployment",
            Dimension::Pod => "pod",
            Dimension::Container => "container",
        }
    }

    /// Column header for this dimension
    pub fn header(&self) -> &str {
        match self {
            Dimension::Cluster => "Cluster",
            Dimension::Node => "Node",
            Dimension::Namespace => "Namespace",
            Dimension::Deployment => "Deployment",
            Dimension::Pod => "Pod",
            Dimension::Container => "Container",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields of a `cluster/node/namespace/pod/container` allocation name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationName {
    pub cluster: String,
    pub node: String,
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl AllocationName {
    pub fn parse(name: &str) -> Result<Self, ParseError> {
        if name == IDLE_KEY {
            return Err(ParseError::IdleAllocation);
        }

        let fields: Vec<&str> = name.split('/').collect();
        if fields.len() != ALLOCATION_NAME_FIELDS {
            return Err(ParseError::FieldCount {
                key: name.to_string(),
                expected: ALLOCATION_NAME_FIELDS,
                found: fields.len(),
            });
        }

        Ok(Self {
            cluster: fields[0].to_string(),
            node: fields[1].to_string(),
            namespace: fields[2].to_string(),
            pod: fields[3].to_string(),
            container: fields[4].to_string(),
        })
    }

    fn field(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Cluster => &self.cluster,
            Dimension::Node => &self.node,
            Dimension::Namespace => &self.namespace,
            Dimension::Pod => &self.pod,
            Dimension::Container => &self.container,
            // allocation names carry no controller information
            Dimension::Deployment => "",
        }
    }
}

impl FromStr for AllocationName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Splits a group title into one field per grouping dimension.
///
/// A single dimension keeps the whole title, so namespace titles containing
/// no slash pass through untouched. A title with fewer segments than
/// dimensions fills the trailing fields with empty strings, which lets a
/// namespace-only title still render under a `namespace/deployment` grouping.
pub fn parse_group_title(title: &str, dimensions: &[Dimension]) -> Result<Vec<String>, ParseError> {
    if dimensions.len() <= 1 {
        return Ok(vec![title.to_string()]);
    }

    let mut fields: Vec<String> = title.split('/').map(str::to_string).collect();
    if fields.len() > dimensions.len() {
        return Err(ParseError::FieldCount {
            key: title.to_string(),
            expected: dimensions.len(),
            found: fields.len(),
        });
    }
    fields.resize(dimensions.len(), String::new());

    Ok(fields)
}

/// Maps a row key to the field values shown and filtered on
pub trait TitleParser {
    /// Dimensions returned by [`TitleParser::fields`], in order
    fn dimensions(&self) -> &[Dimension];

    /// Field values for `title`, one per dimension
    fn fields(&self, title: &str) -> Result<Vec<String>, ParseError>;

    /// Namespace of the row identified by `title`
    fn namespace(&self, title: &str) -> Result<String, ParseError> {
        let index = self
            .dimensions()
            .iter()
            .position(|d| *d == Dimension::Namespace)
            .ok_or_else(|| ParseError::MissingNamespace(title.to_string()))?;

        self.fields(title)?
            .into_iter()
            .nth(index)
            .ok_or_else(|| ParseError::MissingNamespace(title.to_string()))
    }
}

/// Titles produced by aggregated queries, e.g. `namespace/deployment`
#[derive(Debug, Clone)]
pub struct GroupTitle {
    dimensions: Vec<Dimension>,
}

impl GroupTitle {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self { dimensions }
    }
}

impl TitleParser for GroupTitle {
    fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    fn fields(&self, title: &str) -> Result<Vec<String>, ParseError> {
        parse_group_title(title, &self.dimensions)
    }
}

/// Composite allocation names, projected onto the chosen dimensions
#[derive(Debug, Clone)]
pub struct AllocationTitle {
    dimensions: Vec<Dimension>,
}

impl AllocationTitle {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self { dimensions }
    }
}

impl TitleParser for AllocationTitle {
    fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    fn fields(&self, title: &str) -> Result<Vec<String>, ParseError> {
        let name = AllocationName::parse(title)?;
        Ok(self
            .dimensions
            .iter()
            .map(|d| name.field(*d).to_string())
            .collect())
    }

    fn namespace(&self, title: &str) -> Result<String, ParseError> {
        Ok(AllocationName::parse(title)?.namespace)
    }
}
