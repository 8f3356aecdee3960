//! Initial schema: authoring tables, per-kind sub-config tables keyed
//! by node id, shared HTTP definitions with their children, and the
//! run-time response/execution tables. Ids are 16-byte blobs.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Workspace::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Workspace::Id).blob().not_null().primary_key())
                    .col(ColumnDef::new(Workspace::Name).string().not_null())
                    .col(ColumnDef::new(Workspace::ActiveEnv).json().not_null())
                    .col(ColumnDef::new(Workspace::GlobalEnv).json().not_null())
                    .col(
                        ColumnDef::new(Workspace::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WorkspaceUser::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WorkspaceUser::WorkspaceId).blob().not_null())
                    .col(ColumnDef::new(WorkspaceUser::UserId).blob().not_null())
                    .col(ColumnDef::new(WorkspaceUser::Role).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(WorkspaceUser::WorkspaceId)
                            .col(WorkspaceUser::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_workspace_user_user_id")
                    .table(WorkspaceUser::Table)
                    .col(WorkspaceUser::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Flow::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Flow::Id).blob().not_null().primary_key())
                    .col(ColumnDef::new(Flow::WorkspaceId).blob().not_null())
                    .col(ColumnDef::new(Flow::Name).string().not_null())
                    .col(ColumnDef::new(Flow::Running).boolean().not_null())
                    .col(ColumnDef::new(Flow::DurationMs).big_integer())
                    .col(ColumnDef::new(Flow::VersionParentId).blob())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_flow_workspace_id")
                    .table(Flow::Table)
                    .col(Flow::WorkspaceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Node::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Node::Id).blob().not_null().primary_key())
                    .col(ColumnDef::new(Node::FlowId).blob().not_null())
                    .col(ColumnDef::new(Node::Name).string().not_null())
                    .col(ColumnDef::new(Node::Kind).integer().not_null())
                    .col(ColumnDef::new(Node::PosX).double().not_null())
                    .col(ColumnDef::new(Node::PosY).double().not_null())
                    .col(ColumnDef::new(Node::State).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_node_flow_id")
                    .table(Node::Table)
                    .col(Node::FlowId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Edge::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Edge::Id).blob().not_null().primary_key())
                    .col(ColumnDef::new(Edge::FlowId).blob().not_null())
                    .col(ColumnDef::new(Edge::SourceNodeId).blob().not_null())
                    .col(ColumnDef::new(Edge::TargetNodeId).blob().not_null())
                    .col(ColumnDef::new(Edge::SourceHandle).integer().not_null())
                    .col(ColumnDef::new(Edge::Kind).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_edge_flow_id")
                    .table(Edge::Table)
                    .col(Edge::FlowId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FlowVariable::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FlowVariable::Id).blob().not_null().primary_key())
                    .col(ColumnDef::new(FlowVariable::FlowId).blob().not_null())
                    .col(ColumnDef::new(FlowVariable::Name).string().not_null())
                    .col(ColumnDef::new(FlowVariable::Value).text().not_null())
                    .col(ColumnDef::new(FlowVariable::Enabled).boolean().not_null())
                    .col(ColumnDef::new(FlowVariable::Description).text().not_null())
                    .col(ColumnDef::new(FlowVariable::SortOrder).double().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_flow_variable_flow_id")
                    .table(FlowVariable::Table)
                    .col(FlowVariable::FlowId)
                    .to_owned(),
            )
            .await?;

        // ---- Sub-configs, one row per node, keyed by node id ----

        manager
            .create_table(
                Table::create()
                    .table(NodeHttp::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(NodeHttp::NodeId).blob().not_null().primary_key())
                    .col(ColumnDef::new(NodeHttp::HttpId).blob().not_null())
                    .col(ColumnDef::new(NodeHttp::DeltaHttpId).blob())
                    .col(ColumnDef::new(NodeHttp::HasRequestConfig).boolean().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeCondition::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NodeCondition::NodeId)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NodeCondition::Expr).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeFor::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(NodeFor::NodeId).blob().not_null().primary_key())
                    .col(ColumnDef::new(NodeFor::IterCount).big_integer().not_null())
                    .col(ColumnDef::new(NodeFor::ConditionExpr).text())
                    .col(ColumnDef::new(NodeFor::ErrorHandling).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeForEach::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NodeForEach::NodeId)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NodeForEach::IterExpr).text().not_null())
                    .col(ColumnDef::new(NodeForEach::ConditionExpr).text())
                    .col(ColumnDef::new(NodeForEach::ErrorHandling).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeJs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(NodeJs::NodeId).blob().not_null().primary_key())
                    .col(ColumnDef::new(NodeJs::Code).blob().not_null())
                    .col(ColumnDef::new(NodeJs::CompressionKind).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeNoOp::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(NodeNoOp::NodeId).blob().not_null().primary_key())
                    .col(ColumnDef::new(NodeNoOp::Kind).integer().not_null())
                    .to_owned(),
            )
            .await?;

        // ---- Shared HTTP definitions and children ----

        manager
            .create_table(
                Table::create()
                    .table(HttpDefinition::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HttpDefinition::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HttpDefinition::WorkspaceId).blob().not_null())
                    .col(ColumnDef::new(HttpDefinition::Method).string().not_null())
                    .col(ColumnDef::new(HttpDefinition::Url).text().not_null())
                    .col(ColumnDef::new(HttpDefinition::BodyKind).integer().not_null())
                    .col(ColumnDef::new(HttpDefinition::BodyRaw).blob())
                    .col(ColumnDef::new(HttpDefinition::ParentId).blob())
                    .col(ColumnDef::new(HttpDefinition::MethodOverride).string())
                    .col(ColumnDef::new(HttpDefinition::UrlOverride).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_definition_workspace_id")
                    .table(HttpDefinition::Table)
                    .col(HttpDefinition::WorkspaceId)
                    .to_owned(),
            )
            .await?;

        // Headers, queries, and both body-field tables share a shape.
        for table in ["http_header", "http_query", "http_form_field", "http_url_encoded_field"] {
            create_http_child_table(manager, table).await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(HttpAssert::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(HttpAssert::Id).blob().not_null().primary_key())
                    .col(ColumnDef::new(HttpAssert::HttpId).blob().not_null())
                    .col(ColumnDef::new(HttpAssert::Expr).text().not_null())
                    .col(ColumnDef::new(HttpAssert::Enabled).boolean().not_null())
                    .col(ColumnDef::new(HttpAssert::Blocking).boolean().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_assert_http_id")
                    .table(HttpAssert::Table)
                    .col(HttpAssert::HttpId)
                    .to_owned(),
            )
            .await?;

        // ---- Run-time artifacts ----

        manager
            .create_table(
                Table::create()
                    .table(HttpResponse::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(HttpResponse::Id).blob().not_null().primary_key())
                    .col(ColumnDef::new(HttpResponse::FlowId).blob().not_null())
                    .col(ColumnDef::new(HttpResponse::RequestNodeId).blob().not_null())
                    .col(ColumnDef::new(HttpResponse::Status).integer().not_null())
                    .col(ColumnDef::new(HttpResponse::Body).blob().not_null())
                    .col(ColumnDef::new(HttpResponse::DurationMs).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_response_flow_id")
                    .table(HttpResponse::Table)
                    .col(HttpResponse::FlowId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HttpResponseHeader::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HttpResponseHeader::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HttpResponseHeader::ResponseId).blob().not_null())
                    .col(ColumnDef::new(HttpResponseHeader::Key).string().not_null())
                    .col(ColumnDef::new(HttpResponseHeader::Value).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_response_header_response_id")
                    .table(HttpResponseHeader::Table)
                    .col(HttpResponseHeader::ResponseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HttpResponseAssert::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HttpResponseAssert::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HttpResponseAssert::ResponseId).blob().not_null())
                    .col(ColumnDef::new(HttpResponseAssert::Expr).text().not_null())
                    .col(ColumnDef::new(HttpResponseAssert::Result).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_response_assert_response_id")
                    .table(HttpResponseAssert::Table)
                    .col(HttpResponseAssert::ResponseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NodeExecution::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NodeExecution::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NodeExecution::FlowId).blob().not_null())
                    .col(ColumnDef::new(NodeExecution::NodeId).blob().not_null())
                    .col(ColumnDef::new(NodeExecution::Name).string().not_null())
                    .col(ColumnDef::new(NodeExecution::State).integer().not_null())
                    .col(ColumnDef::new(NodeExecution::StartedAt).timestamp().not_null())
                    .col(ColumnDef::new(NodeExecution::CompletedAt).timestamp())
                    .col(ColumnDef::new(NodeExecution::Error).text())
                    .col(ColumnDef::new(NodeExecution::Input).json())
                    .col(ColumnDef::new(NodeExecution::Output).json())
                    .col(ColumnDef::new(NodeExecution::ResponseId).blob())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_node_execution_flow_id")
                    .table(NodeExecution::Table)
                    .col(NodeExecution::FlowId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            "node_execution",
            "http_response_assert",
            "http_response_header",
            "http_response",
            "http_assert",
            "http_url_encoded_field",
            "http_form_field",
            "http_query",
            "http_header",
            "http_definition",
            "node_no_op",
            "node_js",
            "node_for_each",
            "node_for",
            "node_condition",
            "node_http",
            "flow_variable",
            "edge",
            "node",
            "flow",
            "workspace_user",
            "workspace",
        ] {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

/// Shared shape of the four key/value children of an HTTP definition.
async fn create_http_child_table(manager: &SchemaManager<'_>, table: &str) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(Alias::new(table))
                .if_not_exists()
                .col(ColumnDef::new(Alias::new("id")).blob().not_null().primary_key())
                .col(ColumnDef::new(Alias::new("http_id")).blob().not_null())
                .col(ColumnDef::new(Alias::new("key")).string().not_null())
                .col(ColumnDef::new(Alias::new("value")).text().not_null())
                .col(ColumnDef::new(Alias::new("enabled")).boolean().not_null())
                .col(ColumnDef::new(Alias::new("is_delta")).boolean().not_null())
                .col(ColumnDef::new(Alias::new("parent_id")).blob())
                .col(ColumnDef::new(Alias::new("value_override")).text())
                .to_owned(),
        )
        .await?;
    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name(format!("idx_{table}_http_id"))
                .table(Alias::new(table))
                .col(Alias::new("http_id"))
                .to_owned(),
        )
        .await
}

#[derive(DeriveIden)]
enum Workspace {
    Table,
    Id,
    Name,
    ActiveEnv,
    GlobalEnv,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WorkspaceUser {
    Table,
    WorkspaceId,
    UserId,
    Role,
}

#[derive(DeriveIden)]
enum Flow {
    Table,
    Id,
    WorkspaceId,
    Name,
    Running,
    DurationMs,
    VersionParentId,
}

#[derive(DeriveIden)]
enum Node {
    Table,
    Id,
    FlowId,
    Name,
    Kind,
    PosX,
    PosY,
    State,
}

#[derive(DeriveIden)]
enum Edge {
    Table,
    Id,
    FlowId,
    SourceNodeId,
    TargetNodeId,
    SourceHandle,
    Kind,
}

#[derive(DeriveIden)]
enum FlowVariable {
    Table,
    Id,
    FlowId,
    Name,
    Value,
    Enabled,
    Description,
    SortOrder,
}

#[derive(DeriveIden)]
enum NodeHttp {
    Table,
    NodeId,
    HttpId,
    DeltaHttpId,
    HasRequestConfig,
}

#[derive(DeriveIden)]
enum NodeCondition {
    Table,
    NodeId,
    Expr,
}

#[derive(DeriveIden)]
enum NodeFor {
    Table,
    NodeId,
    IterCount,
    ConditionExpr,
    ErrorHandling,
}

#[derive(DeriveIden)]
enum NodeForEach {
    Table,
    NodeId,
    IterExpr,
    ConditionExpr,
    ErrorHandling,
}

#[derive(DeriveIden)]
enum NodeJs {
    Table,
    NodeId,
    Code,
    CompressionKind,
}

#[derive(DeriveIden)]
enum NodeNoOp {
    Table,
    NodeId,
    Kind,
}

#[derive(DeriveIden)]
enum HttpDefinition {
    Table,
    Id,
    WorkspaceId,
    Method,
    Url,
    BodyKind,
    BodyRaw,
    ParentId,
    MethodOverride,
    UrlOverride,
}

#[derive(DeriveIden)]
enum HttpAssert {
    Table,
    Id,
    HttpId,
    Expr,
    Enabled,
    Blocking,
}

#[derive(DeriveIden)]
enum HttpResponse {
    Table,
    Id,
    FlowId,
    RequestNodeId,
    Status,
    Body,
    DurationMs,
}

#[derive(DeriveIden)]
enum HttpResponseHeader {
    Table,
    Id,
    ResponseId,
    Key,
    Value,
}

#[derive(DeriveIden)]
enum HttpResponseAssert {
    Table,
    Id,
    ResponseId,
    Expr,
    Result,
}

#[derive(DeriveIden)]
enum NodeExecution {
    Table,
    Id,
    FlowId,
    NodeId,
    Name,
    State,
    StartedAt,
    CompletedAt,
    Error,
    Input,
    Output,
    ResponseId,
}
