//! Book Queries

use uuid::Uuid;

/// 读取完整书籍树
#[derive(Debug, Clone)]
pub struct GetBook {
    pub space_id: Uuid,
    pub book_id: Uuid,
}

/// 列出空间内所有书籍
#[derive(Debug, Clone)]
pub struct ListBooks {
    pub space_id: Uuid,
}

/// 查询文档（模板/成书）的流水线阶段
#[derive(Debug, Clone)]
pub struct GetRunStatus {
    pub document_id: Uuid,
}
