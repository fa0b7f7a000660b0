#![forbid(unsafe_code)]

//! XPath filtering.
//!
//! Full XPath is not evaluated here. Callers plug in an [`XPathEvaluator`];
//! the [`BuiltinXPathEvaluator`] only knows the expression used to exclude
//! an enveloped signature.

use sigtuna_core::{Error, Result};
use sigtuna_xml::{Element, NamespaceMap, Node};

/// The node an expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct XPathContext<'a> {
    pub node: &'a Node,
    /// Ancestors of `node`, outermost first.
    pub ancestors: &'a [&'a Element],
}

/// Evaluates `boolean(expression)` for a context node.
pub trait XPathEvaluator: Send + Sync {
    fn evaluate(
        &self,
        expression: &str,
        namespaces: &NamespaceMap,
        context: XPathContext<'_>,
    ) -> Result<bool>;
}

/// Understands `not(ancestor-or-self::p:Name)` and rejects anything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinXPathEvaluator;

impl BuiltinXPathEvaluator {
    /// `(prefix, local)` of a `not(ancestor-or-self::prefix:local)` expression.
    fn parse(expression: &str) -> Option<(&str, &str)> {
        let inner = expression
            .trim()
            .strip_prefix("not")?
            .trim_start()
            .strip_prefix('(')?
            .strip_suffix(')')?
            .trim()
            .strip_prefix("ancestor-or-self::")?;
        let (prefix, local) = inner.split_once(':')?;
        let valid = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        };
        (valid(prefix) && valid(local)).then_some((prefix, local))
    }
}

impl XPathEvaluator for BuiltinXPathEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        namespaces: &NamespaceMap,
        context: XPathContext<'_>,
    ) -> Result<bool> {
        let (prefix, local) = Self::parse(expression)
            .ok_or_else(|| Error::Transform(format!("unsupported XPath expression '{expression}'")))?;
        let uri = namespaces
            .get(prefix)
            .ok_or_else(|| Error::Transform(format!("XPath prefix '{prefix}' is not bound")))?;
        let self_matches = context.node.as_element().is_some_and(|e| e.is(uri, local));
        let ancestor_matches = context.ancestors.iter().any(|e| e.is(uri, local));
        Ok(!(self_matches || ancestor_matches))
    }
}

/// Remove every node for which `boolean(expression)` is false, starting
/// with `root` and recursing into surviving elements.
///
/// Returns the number of nodes pruned below `root`, or `None` when `root`
/// itself is excluded and nothing survives. Any evaluation error aborts
/// the filter and leaves `root` untouched.
pub fn filter(
    root: &mut Element,
    expression: &str,
    namespaces: &NamespaceMap,
    evaluator: &dyn XPathEvaluator,
) -> Result<Option<usize>> {
    let node = Node::Element(std::mem::replace(root, Element::new("")));
    let verdict = evaluator.evaluate(
        expression,
        namespaces,
        XPathContext {
            node: &node,
            ancestors: &[],
        },
    );
    if let Node::Element(element) = node {
        *root = element;
    }
    if !verdict? {
        log::debug!("XPath filter '{expression}' excluded <{}>", root.qualified_name());
        return Ok(None);
    }

    let mut doomed = Vec::new();
    {
        let mut ancestors = vec![&*root];
        let mut path = Vec::new();
        collect_pruned(root, expression, namespaces, evaluator, &mut ancestors, &mut path, &mut doomed)?;
    }
    // Later siblings first keeps the remaining indices valid.
    doomed.sort();
    for path in doomed.iter().rev() {
        remove_at(root, path);
    }
    log::debug!("XPath filter '{expression}' pruned {} node(s)", doomed.len());
    Ok(Some(doomed.len()))
}

fn collect_pruned<'a>(
    element: &'a Element,
    expression: &str,
    namespaces: &NamespaceMap,
    evaluator: &dyn XPathEvaluator,
    ancestors: &mut Vec<&'a Element>,
    path: &mut Vec<usize>,
    doomed: &mut Vec<Vec<usize>>,
) -> Result<()> {
    for (index, child) in element.children.iter().enumerate() {
        path.push(index);
        let keep = evaluator.evaluate(
            expression,
            namespaces,
            XPathContext {
                node: child,
                ancestors: ancestors.as_slice(),
            },
        )?;
        if !keep {
            doomed.push(path.clone());
        } else if let Node::Element(e) = child {
            ancestors.push(e);
            collect_pruned(e, expression, namespaces, evaluator, ancestors, path, doomed)?;
            ancestors.pop();
        }
        path.pop();
    }
    Ok(())
}

fn remove_at(root: &mut Element, path: &[usize]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = root;
    for &index in parents {
        match current.children.get_mut(index).and_then(Node::as_element_mut) {
            Some(e) => current = e,
            None => return,
        }
    }
    if *last < current.children.len() {
        current.children.remove(*last);
    }
}
