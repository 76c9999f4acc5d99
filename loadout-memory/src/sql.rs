//! SQL-style rendering of scopes, for the query log and diagnostics.

use loadout_query::{Condition, Projection, Scope};

/// Render the query text a SQL backend would run for `scope`.
pub fn render_select(scope: &Scope, columns: &[Projection]) -> String {
    let mut sql = String::with_capacity(64);

    // SELECT clause
    sql.push_str("SELECT ");
    if columns.is_empty() {
        sql.push('*');
    } else {
        let parts: Vec<String> = columns
            .iter()
            .map(|projection| match projection {
                Projection::Column(name) => format!("{}.{}", scope.table, name),
                expression => expression.to_string(),
            })
            .collect();
        sql.push_str(&parts.join(", "));
    }

    // FROM and JOIN clauses
    sql.push_str(" FROM ");
    sql.push_str(&scope.table);
    for join in &scope.joins {
        sql.push(' ');
        sql.push_str(join);
    }

    // WHERE clause
    if !scope.conditions.is_empty() {
        let parts: Vec<String> = scope
            .conditions
            .iter()
            .map(|condition| match condition {
                Condition::Equals { column, value } => {
                    format!("{}.{} = {}", scope.table, column, value)
                }
                Condition::In { column, values } => {
                    let values: Vec<String> = values.iter().map(ToString::to_string).collect();
                    format!("{}.{} IN ({})", scope.table, column, values.join(", "))
                }
            })
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(" AND "));
    }

    // ORDER BY clause
    if !scope.order_by.is_empty() {
        let parts: Vec<String> = scope
            .order_by
            .iter()
            .map(|(column, order)| format!("{}.{} {}", scope.table, column, order.as_sql()))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&parts.join(", "));
    }

    // LIMIT clause
    if let Some(limit) = scope.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadout_query::SortOrder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_full_scope() {
        let scope = Scope::new("Post", "posts")
            .join("JOIN blogs ON blogs.id = posts.blog_id")
            .r#where("status", "published")
            .where_in("id", [1, 2])
            .order_by("id", SortOrder::Desc)
            .limit(10);
        let columns = vec![
            Projection::Column("id".into()),
            Projection::Expression {
                alias: "blog_name".into(),
                sql: "blogs.name".into(),
            },
        ];

        assert_eq!(
            render_select(&scope, &columns),
            "SELECT posts.id, (blogs.name) AS blog_name FROM posts \
             JOIN blogs ON blogs.id = posts.blog_id \
             WHERE posts.status = 'published' AND posts.id IN (1, 2) \
             ORDER BY posts.id DESC LIMIT 10"
        );
    }

    #[test]
    fn test_render_bare_scope() {
        assert_eq!(
            render_select(&Scope::new("Post", "posts"), &[]),
            "SELECT * FROM posts"
        );
    }
}
