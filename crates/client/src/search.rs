//! Search parameters.

/// Name of the page size parameter.
pub const COUNT_PARAM: &str = "_count";
/// Name of the logical id parameter.
pub const ID_PARAM: &str = "_id";
/// Name of the include directive parameter.
pub const INCLUDE_PARAM: &str = "_include";
/// Name of the history cut-off parameter.
pub const SINCE_PARAM: &str = "_since";
/// Name of the format override parameter.
pub const FORMAT_PARAM: &str = "_format";

/// One `name=value` search criterion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchParam {
    pub name: String,
    pub value: String,
}

impl SearchParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An ordered list of search criteria.
///
/// Repeating a name is meaningful (`name=Eve&name=Everywoman` narrows the
/// search) and is preserved as repeated query parameters, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    params: Vec<SearchParam>,
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a criterion.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.push(SearchParam::new(name, value));
        self
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, value);
        self
    }

    /// Appends an `_include` directive.
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.add(INCLUDE_PARAM, path);
        self
    }

    /// Values of every criterion named `name`, in order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.params
            .iter()
            .filter(move |p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchParam> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl FromIterator<SearchParam> for SearchParams {
    fn from_iter<I: IntoIterator<Item = SearchParam>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for SearchParams {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(name, value)| SearchParam::new(name, value))
            .collect()
    }
}

impl<'a> IntoIterator for &'a SearchParams {
    type Item = &'a SearchParam;
    type IntoIter = std::slice::Iter<'a, SearchParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
