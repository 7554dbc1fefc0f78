//! Small path helpers over `roxmltree` nodes.

use roxmltree::Node;

/// First child element called `name`.
pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.has_tag_name(name))
}

/// All child elements called `name`, in document order.
pub(crate) fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| n.is_element() && n.has_tag_name(name))
}

/// Follow a path of element names, taking the first match at each step.
pub(crate) fn at<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Option<Node<'a, 'input>> {
    path.iter().try_fold(node, |n, name| child(n, name))
}

/// Trimmed text of the element at `path`; `None` when absent or empty.
pub(crate) fn text<'a>(node: Node<'a, '_>, path: &[&str]) -> Option<&'a str> {
    at(node, path)?.text().map(str::trim).filter(|t| !t.is_empty())
}

/// Text of the element at `path` exactly as written, for free-form values
/// such as kernel command lines; `None` when absent or empty.
pub(crate) fn raw_text<'a>(node: Node<'a, '_>, path: &[&str]) -> Option<&'a str> {
    at(node, path)?.text().filter(|t| !t.is_empty())
}

/// Attribute of the element at `path`.
pub(crate) fn attr<'a>(node: Node<'a, '_>, path: &[&str], name: &str) -> Option<&'a str> {
    at(node, path)?.attribute(name)
}

/// Number of elements matching the last step of `path`, under the first
/// match of the preceding steps.
pub(crate) fn count(node: Node<'_, '_>, path: &[&str]) -> usize {
    match path.split_last() {
        Some((last, parent)) => at(node, parent).map_or(0, |p| children(p, last).count()),
        None => 0,
    }
}
